//! Error types for drda-core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// `a - b` with `a < b`.
    #[error("Subtraction would produce a negative result")]
    NegativeResult,

    #[error("Division by zero")]
    DivisionByZero,

    /// `gcd(a, modulus) != 1`.
    #[error("No modular inverse exists (gcd is not 1)")]
    NoInverse,

    #[error("Empty or inverted range: min must be below max")]
    InvalidRange,

    #[error("Empty numeric string")]
    EmptyInput,

    #[error("Invalid {radix} digit '{digit}'")]
    InvalidDigit { radix: &'static str, digit: char },

    #[error("Value does not fit in {0}")]
    Overflow(&'static str),

    /// RSA key generation below the supported floor.
    #[error("RSA bit length {0} is too small (minimum is 512)")]
    BitLengthTooSmall(usize),

    #[error("Public exponent is not coprime with phi(n)")]
    NonCoprimeExponent,

    #[error("Message must be smaller than the modulus")]
    MessageTooLarge,

    #[error("Key has no private exponent")]
    MissingPrivateExponent,

    /// Malformed DER or PEM input.
    #[error("Invalid key encoding: {0}")]
    Encoding(String),
}

impl CoreError {
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }
}

/// Result type alias for drda-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CoreError::BitLengthTooSmall(256).to_string(),
            "RSA bit length 256 is too small (minimum is 512)"
        );
        assert_eq!(
            CoreError::InvalidDigit { radix: "hex", digit: 'z' }.to_string(),
            "Invalid hex digit 'z'"
        );
    }
}
