//! Modular arithmetic, primality and randomness on top of `BigInteger`.

use super::BigInteger;
use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use std::cmp::Ordering;

/// Trial divisors checked before any Miller–Rabin round.
const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// Default Miller–Rabin rounds.
pub const DEFAULT_ROUNDS: usize = 5;

/// Sign and magnitude, for Bézout coefficients. Zero is never negative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signed {
    pub negative: bool,
    pub magnitude: BigInteger,
}

impl Signed {
    pub fn positive(magnitude: BigInteger) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    fn new(negative: bool, magnitude: BigInteger) -> Self {
        let negative = negative && !magnitude.is_zero();
        Self {
            negative,
            magnitude,
        }
    }

    fn add(&self, other: &Self) -> Self {
        if self.negative == other.negative {
            return Self::new(self.negative, self.magnitude.add(&other.magnitude));
        }
        match self.magnitude.cmp(&other.magnitude) {
            Ordering::Less => Self::new(other.negative, diff(&other.magnitude, &self.magnitude)),
            _ => Self::new(self.negative, diff(&self.magnitude, &other.magnitude)),
        }
    }

    fn sub(&self, other: &Self) -> Self {
        self.add(&Self::new(!other.negative, other.magnitude.clone()))
    }

    fn scale(&self, factor: &BigInteger) -> Self {
        Self::new(self.negative, self.magnitude.multiply(factor))
    }

    /// Representative in `[0, modulus)`.
    pub fn reduce(&self, modulus: &BigInteger) -> CoreResult<BigInteger> {
        let r = self.magnitude.modulo(modulus)?;
        if self.negative && !r.is_zero() {
            return modulus.subtract(&r);
        }
        Ok(r)
    }
}

/// `a - b` for `a >= b`, already ordered by the caller.
fn diff(a: &BigInteger, b: &BigInteger) -> BigInteger {
    a.subtract(b).unwrap_or_else(|_| BigInteger::zero())
}

/// `a·x + b·y = gcd`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedGcd {
    pub gcd: BigInteger,
    pub x: Signed,
    pub y: Signed,
}

impl BigInteger {
    /// `self^exp mod modulus` by left-to-right square-and-multiply.
    pub fn mod_pow(&self, exp: &BigInteger, modulus: &BigInteger) -> CoreResult<BigInteger> {
        if modulus.is_zero() {
            return Err(CoreError::DivisionByZero);
        }
        if modulus.is_one() {
            return Ok(BigInteger::zero());
        }
        let base = self.modulo(modulus)?;
        let mut result = BigInteger::one();
        for i in (0..exp.bit_len()).rev() {
            result = result.multiply(&result).modulo(modulus)?;
            if exp.bit(i) {
                result = result.multiply(&base).modulo(modulus)?;
            }
        }
        Ok(result)
    }

    pub fn gcd(&self, other: &BigInteger) -> BigInteger {
        let mut a = self.clone();
        let mut b = other.clone();
        while !b.is_zero() {
            let r = match a.modulo(&b) {
                Ok(r) => r,
                Err(_) => break,
            };
            a = b;
            b = r;
        }
        a
    }

    /// Iterative extended Euclid.
    pub fn extended_gcd(&self, other: &BigInteger) -> ExtendedGcd {
        let mut old_r = self.clone();
        let mut r = other.clone();
        let mut old_s = Signed::positive(BigInteger::one());
        let mut s = Signed::positive(BigInteger::zero());
        let mut old_t = Signed::positive(BigInteger::zero());
        let mut t = Signed::positive(BigInteger::one());

        while !r.is_zero() {
            let (q, rem) = match old_r.divmod(&r) {
                Ok(qr) => qr,
                Err(_) => break,
            };
            old_r = std::mem::replace(&mut r, rem);
            let next_s = old_s.sub(&s.scale(&q));
            old_s = std::mem::replace(&mut s, next_s);
            let next_t = old_t.sub(&t.scale(&q));
            old_t = std::mem::replace(&mut t, next_t);
        }

        ExtendedGcd {
            gcd: old_r,
            x: old_s,
            y: old_t,
        }
    }

    /// `x` with `self·x ≡ 1 (mod modulus)`.
    pub fn mod_inverse(&self, modulus: &BigInteger) -> CoreResult<BigInteger> {
        if modulus.is_zero() {
            return Err(CoreError::DivisionByZero);
        }
        let a = self.modulo(modulus)?;
        let eg = a.extended_gcd(modulus);
        if !eg.gcd.is_one() {
            return Err(CoreError::NoInverse);
        }
        eg.x.reduce(modulus)
    }

    /// Miller–Rabin with `rounds` random bases in `[2, n-2]`.
    ///
    /// Small candidates are settled by trial division first. A `true`
    /// result is probabilistic; `false` is always correct.
    pub fn is_probable_prime(&self, rounds: usize) -> bool {
        if self.byte_len() <= 1 && self.as_bytes()[0] < 2 {
            return false;
        }
        for &p in SMALL_PRIMES.iter() {
            if *self == BigInteger::from(p) {
                return true;
            }
            if matches!(self.rem_u32(p), Ok(0)) {
                return false;
            }
        }

        let one = BigInteger::one();
        let n_minus_1 = diff(self, &one);
        let s = n_minus_1.trailing_zeros();
        let d = n_minus_1.shift_right_bits(s);

        'witness: for _ in 0..rounds {
            let a = match BigInteger::random_in_range(&BigInteger::from(2u32), &n_minus_1) {
                Ok(a) => a,
                Err(_) => return false,
            };
            let mut x = match a.mod_pow(&d, self) {
                Ok(x) => x,
                Err(_) => return false,
            };
            if x.is_one() || x == n_minus_1 {
                continue;
            }
            for _ in 1..s {
                x = match x.multiply(&x).modulo(self) {
                    Ok(x) => x,
                    Err(_) => return false,
                };
                if x == n_minus_1 {
                    continue 'witness;
                }
                if x.is_one() {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// Uniform draw from `[min, max)` by rejection sampling over the
    /// byte length of `max - min`.
    pub fn random_in_range(min: &BigInteger, max: &BigInteger) -> CoreResult<BigInteger> {
        if min >= max {
            return Err(CoreError::InvalidRange);
        }
        let range = max.subtract(min)?;
        let len = range.byte_len();
        let top_bits = range.bit_len() - (len - 1) * 8;
        let mask = if top_bits >= 8 {
            0xFF
        } else {
            (1u8 << top_bits) - 1
        };

        let mut rng = rand::rng();
        let mut buf = vec![0u8; len];
        loop {
            rng.fill_bytes(&mut buf);
            buf[0] &= mask;
            let draw = BigInteger::from_bytes_be(&buf);
            if draw < range {
                return Ok(min.add(&draw));
            }
        }
    }

    /// Uniform value below `2^bits`.
    pub fn random_bits(bits: usize) -> BigInteger {
        if bits == 0 {
            return BigInteger::zero();
        }
        let len = bits.div_ceil(8);
        let mut buf = vec![0u8; len];
        rand::rng().fill_bytes(&mut buf);
        let extra = len * 8 - bits;
        buf[0] &= 0xFF >> extra;
        BigInteger::from_bytes_be(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigInteger {
        BigInteger::from(n)
    }

    fn to_i128(s: &Signed) -> i128 {
        let m = u64::try_from(&s.magnitude).unwrap() as i128;
        if s.negative { -m } else { m }
    }

    #[test]
    fn test_mod_pow_small() {
        assert_eq!(big(4).mod_pow(&big(13), &big(497)).unwrap(), big(445));
        assert_eq!(big(7).mod_pow(&big(0), &big(13)).unwrap(), big(1));
        assert_eq!(big(7).mod_pow(&big(5), &big(1)).unwrap(), big(0));
        assert_eq!(
            big(7).mod_pow(&big(5), &big(0)),
            Err(CoreError::DivisionByZero)
        );
    }

    #[test]
    fn test_extended_gcd_bezout() {
        let eg = big(240).extended_gcd(&big(46));
        assert_eq!(eg.gcd, big(2));
        assert_eq!(240 * to_i128(&eg.x) + 46 * to_i128(&eg.y), 2);
    }

    #[test]
    fn test_mod_inverse() {
        assert_eq!(big(3).mod_inverse(&big(11)).unwrap(), big(4));
        assert_eq!(big(17).mod_inverse(&big(3120)).unwrap(), big(2753));
        assert_eq!(big(6).mod_inverse(&big(9)), Err(CoreError::NoInverse));
    }

    #[test]
    fn test_gcd() {
        assert_eq!(big(48).gcd(&big(18)), big(6));
        assert_eq!(big(17).gcd(&big(0)), big(17));
    }

    #[test]
    fn test_small_primes() {
        for p in [2u64, 3, 5, 61, 97, 101, 7919, 104729] {
            assert!(big(p).is_probable_prime(DEFAULT_ROUNDS), "{p} is prime");
        }
        for c in [0u64, 1, 4, 100, 999, 561, 10403] {
            assert!(!big(c).is_probable_prime(10), "{c} is composite");
        }
    }

    #[test]
    fn test_random_in_range_bounds() {
        let min = big(1000);
        let max = big(1003);
        for _ in 0..200 {
            let v = BigInteger::random_in_range(&min, &max).unwrap();
            assert!(v >= min && v < max);
        }
        assert_eq!(
            BigInteger::random_in_range(&max, &min),
            Err(CoreError::InvalidRange)
        );
    }

    #[test]
    fn test_random_bits_width() {
        for _ in 0..50 {
            assert!(BigInteger::random_bits(12).bit_len() <= 12);
        }
    }
}
