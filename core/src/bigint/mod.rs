//! Arbitrary-precision non-negative integers.
//!
//! A `BigInteger` is a most-significant-first byte string with no leading
//! zero bytes (zero is `[0]`). Values are immutable: every operation returns
//! a new integer. Subtraction that would go negative is an error rather
//! than a wrap.
//!
//! ```
//! use drda_core::BigInteger;
//!
//! let a = BigInteger::from(1_000_000u64);
//! let b = BigInteger::from_hex("f4240").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.multiply(&b).to_string(), "1000000000000");
//! ```

mod arith;
mod prime;

pub use arith::KARATSUBA_THRESHOLD;
pub use prime::{DEFAULT_ROUNDS, ExtendedGcd, Signed};

use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BigInteger {
    bytes: Vec<u8>,
}

impl BigInteger {
    pub fn zero() -> Self {
        Self { bytes: vec![0] }
    }

    pub fn one() -> Self {
        Self { bytes: vec![1] }
    }

    /// Build from big-endian bytes. Leading zeros are dropped.
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        if start == bytes.len() {
            return Self::zero();
        }
        Self {
            bytes: bytes[start..].to_vec(),
        }
    }

    /// Canonical big-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Big-endian bytes left-padded with zeros to `len`. Values longer than
    /// `len` are returned unpadded.
    pub fn to_bytes_padded(&self, len: usize) -> Vec<u8> {
        if self.bytes.len() >= len {
            return self.bytes.clone();
        }
        let mut out = vec![0u8; len - self.bytes.len()];
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn is_zero(&self) -> bool {
        self.bytes == [0]
    }

    pub fn is_one(&self) -> bool {
        self.bytes == [1]
    }

    pub fn is_even(&self) -> bool {
        self.bytes[self.bytes.len() - 1] & 1 == 0
    }

    pub fn is_odd(&self) -> bool {
        !self.is_even()
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Number of significant bits (0 for zero).
    pub fn bit_len(&self) -> usize {
        if self.is_zero() {
            return 0;
        }
        (self.bytes.len() - 1) * 8 + (8 - self.bytes[0].leading_zeros() as usize)
    }

    /// Bit `index`, counting from the least significant bit.
    pub fn bit(&self, index: usize) -> bool {
        let byte = index / 8;
        if byte >= self.bytes.len() {
            return false;
        }
        self.bytes[self.bytes.len() - 1 - byte] >> (index % 8) & 1 == 1
    }

    pub(crate) fn from_le(mut digits: Vec<u8>) -> Self {
        digits = arith::trim(digits);
        if digits.is_empty() {
            return Self::zero();
        }
        digits.reverse();
        Self { bytes: digits }
    }

    pub(crate) fn to_le(&self) -> Vec<u8> {
        if self.is_zero() {
            return Vec::new();
        }
        self.bytes.iter().rev().copied().collect()
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::from_le(arith::add(&self.to_le(), &other.to_le()))
    }

    /// `self - other`, failing with `NegativeResult` when `self < other`.
    pub fn subtract(&self, other: &Self) -> CoreResult<Self> {
        if self < other {
            return Err(CoreError::NegativeResult);
        }
        Ok(Self::from_le(arith::sub(&self.to_le(), &other.to_le())))
    }

    /// Product, picking grade-school or Karatsuba by operand size.
    pub fn multiply(&self, other: &Self) -> Self {
        Self::from_le(arith::mul(&self.to_le(), &other.to_le()))
    }

    /// Grade-school O(n²) product regardless of size.
    pub fn multiply_schoolbook(&self, other: &Self) -> Self {
        Self::from_le(arith::mul_schoolbook(&self.to_le(), &other.to_le()))
    }

    /// Karatsuba product; falls back to grade-school below
    /// [`KARATSUBA_THRESHOLD`] bytes.
    pub fn multiply_karatsuba(&self, other: &Self) -> Self {
        Self::from_le(arith::mul_karatsuba(&self.to_le(), &other.to_le()))
    }

    /// Quotient and remainder, with the remainder in `[0, divisor)`.
    pub fn divmod(&self, divisor: &Self) -> CoreResult<(Self, Self)> {
        if divisor.is_zero() {
            return Err(CoreError::DivisionByZero);
        }
        let (q, r) = arith::divmod(&self.to_le(), &divisor.to_le());
        Ok((Self::from_le(q), Self::from_le(r)))
    }

    pub fn divide(&self, divisor: &Self) -> CoreResult<Self> {
        self.divmod(divisor).map(|(q, _)| q)
    }

    /// `self mod modulus`, computed on the byte representation.
    pub fn modulo(&self, modulus: &Self) -> CoreResult<Self> {
        self.divmod(modulus).map(|(_, r)| r)
    }

    /// Remainder by a machine word, used for trial division.
    pub fn rem_u32(&self, divisor: u32) -> CoreResult<u32> {
        if divisor == 0 {
            return Err(CoreError::DivisionByZero);
        }
        Ok(arith::rem_u32(&self.to_le(), divisor))
    }

    /// `self · 256^bytes`
    pub fn shift_left_bytes(&self, bytes: usize) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let mut out = self.bytes.clone();
        out.resize(out.len() + bytes, 0);
        Self { bytes: out }
    }

    pub fn shift_right_bits(&self, bits: usize) -> Self {
        Self::from_le(arith::shr(&self.to_le(), bits))
    }

    /// Number of trailing zero bits (0 for zero).
    pub fn trailing_zeros(&self) -> usize {
        if self.is_zero() {
            return 0;
        }
        let mut count = 0;
        for &byte in self.bytes.iter().rev() {
            if byte == 0 {
                count += 8;
            } else {
                return count + byte.trailing_zeros() as usize;
            }
        }
        count
    }

    /// Parse hexadecimal, with or without a `0x` prefix.
    pub fn from_hex(input: &str) -> CoreResult<Self> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);
        if digits.is_empty() {
            return Err(CoreError::EmptyInput);
        }
        let mut nibbles = Vec::with_capacity(digits.len());
        for c in digits.chars() {
            let v = c.to_digit(16).ok_or(CoreError::InvalidDigit {
                radix: "hex",
                digit: c,
            })?;
            nibbles.push(v as u8);
        }
        if nibbles.len() % 2 == 1 {
            nibbles.insert(0, 0);
        }
        let bytes: Vec<u8> = nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect();
        Ok(Self::from_bytes_be(&bytes))
    }

    /// Lowercase hex without leading zeros (`"0"` for zero).
    pub fn to_hex(&self) -> String {
        let mut out: String = self.bytes.iter().map(|b| format!("{:02x}", b)).collect();
        if out.len() > 1 && out.starts_with('0') {
            out.remove(0);
        }
        out
    }

    pub fn from_decimal_str(input: &str) -> CoreResult<Self> {
        if input.is_empty() {
            return Err(CoreError::EmptyInput);
        }
        let mut acc = Vec::new();
        for c in input.chars() {
            let d = c.to_digit(10).ok_or(CoreError::InvalidDigit {
                radix: "decimal",
                digit: c,
            })?;
            acc = arith::mul_small_add(&acc, 10, d as u8);
        }
        Ok(Self::from_le(acc))
    }

    pub fn to_decimal_string(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        // two decimal digits per division
        let mut digits = self.to_le();
        let mut pairs = Vec::new();
        while !digits.is_empty() {
            let (q, r) = arith::divmod_small(&digits, 100);
            pairs.push(r);
            digits = q;
        }
        let mut out = String::with_capacity(pairs.len() * 2);
        for (i, pair) in pairs.iter().rev().enumerate() {
            if i == 0 {
                out.push_str(&pair.to_string());
            } else {
                out.push_str(&format!("{:02}", pair));
            }
        }
        out
    }
}

impl Ord for BigInteger {
    /// Length first, then bytes lexicographically.
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .len()
            .cmp(&other.bytes.len())
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

impl PartialOrd for BigInteger {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for BigInteger {
    fn from(value: u64) -> Self {
        Self::from_bytes_be(&value.to_be_bytes())
    }
}

impl From<u32> for BigInteger {
    fn from(value: u32) -> Self {
        Self::from_bytes_be(&value.to_be_bytes())
    }
}

impl TryFrom<&BigInteger> for u64 {
    type Error = CoreError;

    fn try_from(value: &BigInteger) -> Result<Self, Self::Error> {
        if value.bytes.len() > 8 {
            return Err(CoreError::Overflow("u64"));
        }
        Ok(value
            .bytes
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}

impl FromStr for BigInteger {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") || s.starts_with("0X") {
            Self::from_hex(s)
        } else {
            Self::from_decimal_str(s)
        }
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl fmt::LowerHex for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigInteger(0x{})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigInteger {
        BigInteger::from(n)
    }

    #[test]
    fn test_canonical_zero() {
        assert_eq!(BigInteger::from_bytes_be(&[0, 0, 0]).as_bytes(), &[0]);
        assert_eq!(BigInteger::from_bytes_be(&[]).as_bytes(), &[0]);
        assert_eq!(BigInteger::from_bytes_be(&[0, 1, 2]).as_bytes(), &[1, 2]);
        assert!(big(5).subtract(&big(5)).unwrap().is_zero());
    }

    #[test]
    fn test_subtract_negative_fails() {
        assert_eq!(big(3).subtract(&big(4)), Err(CoreError::NegativeResult));
    }

    #[test]
    fn test_compare_length_then_bytes() {
        assert!(big(0x100) > big(0xFF));
        assert!(big(0x1234) < big(0x1235));
        assert_eq!(big(7).cmp(&big(7)), Ordering::Equal);
    }

    #[test]
    fn test_divmod_contract() {
        let (q, r) = big(1_000_003).divmod(&big(97)).unwrap();
        assert_eq!(q, big(1_000_003 / 97));
        assert_eq!(r, big(1_000_003 % 97));
        assert_eq!(big(5).divmod(&big(0)), Err(CoreError::DivisionByZero));
        let (q, r) = big(5).divmod(&big(9)).unwrap();
        assert!(q.is_zero());
        assert_eq!(r, big(5));
    }

    #[test]
    fn test_hex_round_trip() {
        let n = BigInteger::from_hex("0x0abcdef").unwrap();
        assert_eq!(n.to_hex(), "abcdef");
        assert_eq!(BigInteger::zero().to_hex(), "0");
        assert!(matches!(
            BigInteger::from_hex("12g4"),
            Err(CoreError::InvalidDigit { radix: "hex", digit: 'g' })
        ));
        assert_eq!(BigInteger::from_hex(""), Err(CoreError::EmptyInput));
    }

    #[test]
    fn test_decimal_string() {
        let n: BigInteger = "340282366920938463463374607431768211457".parse().unwrap();
        assert_eq!(n.to_string(), "340282366920938463463374607431768211457");
        assert_eq!(big(1005).to_string(), "1005");
        assert_eq!(big(0).to_string(), "0");
    }

    #[test]
    fn test_bits() {
        assert_eq!(big(0).bit_len(), 0);
        assert_eq!(big(1).bit_len(), 1);
        assert_eq!(big(0x1FF).bit_len(), 9);
        assert!(big(0x100).bit(8));
        assert!(!big(0x100).bit(7));
        assert_eq!(big(0x100).trailing_zeros(), 8);
        assert_eq!(big(0x1000).shift_right_bits(4), big(0x100));
        assert_eq!(big(0x12).shift_left_bytes(2), big(0x120000));
    }

    #[test]
    fn test_u64_conversion() {
        assert_eq!(u64::try_from(&big(u64::MAX)).unwrap(), u64::MAX);
        let too_big = big(u64::MAX).add(&big(1));
        assert_eq!(u64::try_from(&too_big), Err(CoreError::Overflow("u64")));
    }

    #[test]
    fn test_padded_bytes() {
        assert_eq!(big(0x0102).to_bytes_padded(4), vec![0, 0, 1, 2]);
        assert_eq!(big(0x0102).to_bytes_padded(1), vec![1, 2]);
    }
}
