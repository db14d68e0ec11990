//! Encoding and decoding errors for the DRDA wire protocol.

use super::code_points;
use thiserror::Error;

/// Errors raised while building a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Null-terminated fields cannot carry an interior NUL.
    #[error("{0} contains a NUL byte (0x00)")]
    NullByte(&'static str),

    /// Every length field is 16 bits.
    #[error("{what} is {len} bytes, exceeding the 16-bit length field")]
    TooLarge { what: &'static str, len: usize },
}

/// Errors raised while parsing a received frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Invalid frame flags 0x{0:02X} (expected 0xD0)")]
    BadFlags(u8),

    #[error("{what} length {declared} does not match {actual} available bytes")]
    LengthMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("Unexpected frame type 0x{0:02X}")]
    UnexpectedFrameType(u8),

    #[error("Correlation id mismatch: sent {expected}, received {found}")]
    CorrelationMismatch { expected: u16, found: u16 },

    #[error("Expected {expected}, received {} (0x{found:04X})", code_points::name(*.found))]
    UnexpectedCodePoint { expected: &'static str, found: u16 },

    #[error("Missing required parameter 0x{0:04X}")]
    MissingParameter(u16),

    #[error("Invalid parameter 0x{code_point:04X}: {reason}")]
    InvalidParameter { code_point: u16, reason: String },

    #[error("Unknown value type 0x{0:02X}")]
    UnknownValueType(u8),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

impl DecodeError {
    pub(crate) fn truncated(what: &'static str, needed: usize, available: usize) -> Self {
        Self::Truncated {
            what,
            needed,
            available,
        }
    }

    pub(crate) fn invalid(code_point: u16, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            code_point,
            reason: reason.into(),
        }
    }
}
