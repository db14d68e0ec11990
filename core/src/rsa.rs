//! Textbook RSA over [`BigInteger`].
//!
//! Keys protect credentials during the DRDA security check. There is no
//! padding scheme: `encrypt(m) = m^e mod n` and `m` must be below `n`.

use crate::bigint::{BigInteger, DEFAULT_ROUNDS};
use crate::der::{self, DerReader};
use crate::error::{CoreError, CoreResult};
use rand::RngCore;
use std::fmt;

pub const PUBLIC_EXPONENT: u32 = 65537;
pub const MIN_BITS: usize = 512;

pub const PUBLIC_PEM_LABEL: &str = "RSA PUBLIC KEY";
pub const PRIVATE_PEM_LABEL: &str = "RSA PRIVATE KEY";

#[derive(Clone, PartialEq, Eq)]
pub struct RsaKeyPair {
    modulus: BigInteger,
    public_exponent: BigInteger,
    private_exponent: Option<BigInteger>,
}

impl RsaKeyPair {
    /// Generate a key with a `bits`-bit modulus built from two distinct
    /// primes of `bits/2` and `bits - bits/2` bits.
    pub fn generate(bits: usize) -> CoreResult<Self> {
        if bits < MIN_BITS {
            return Err(CoreError::BitLengthTooSmall(bits));
        }
        let half = bits / 2;
        loop {
            let p = random_prime(half);
            let mut q = random_prime(bits - half);
            while q == p {
                q = random_prime(bits - half);
            }
            match Self::from_primes(&p, &q) {
                Err(CoreError::NonCoprimeExponent) => continue,
                other => return other,
            }
        }
    }

    /// Derive the key pair from two primes with `e = 65537`.
    pub fn from_primes(p: &BigInteger, q: &BigInteger) -> CoreResult<Self> {
        let one = BigInteger::one();
        let modulus = p.multiply(q);
        let phi = p.subtract(&one)?.multiply(&q.subtract(&one)?);
        let e = BigInteger::from(PUBLIC_EXPONENT);
        if !e.gcd(&phi).is_one() {
            return Err(CoreError::NonCoprimeExponent);
        }
        let d = e.mod_inverse(&phi)?;
        Ok(Self {
            modulus,
            public_exponent: e,
            private_exponent: Some(d),
        })
    }

    pub fn from_public_parts(modulus: BigInteger, public_exponent: BigInteger) -> Self {
        Self {
            modulus,
            public_exponent,
            private_exponent: None,
        }
    }

    pub fn modulus(&self) -> &BigInteger {
        &self.modulus
    }

    pub fn public_exponent(&self) -> &BigInteger {
        &self.public_exponent
    }

    pub fn private_exponent(&self) -> Option<&BigInteger> {
        self.private_exponent.as_ref()
    }

    pub fn has_private(&self) -> bool {
        self.private_exponent.is_some()
    }

    /// Modulus size in bytes; ciphertexts are padded to this width.
    pub fn modulus_len(&self) -> usize {
        self.modulus.byte_len()
    }

    /// The same key without the private exponent.
    pub fn public_key(&self) -> Self {
        Self::from_public_parts(self.modulus.clone(), self.public_exponent.clone())
    }

    pub fn encrypt(&self, message: &BigInteger) -> CoreResult<BigInteger> {
        if *message >= self.modulus {
            return Err(CoreError::MessageTooLarge);
        }
        message.mod_pow(&self.public_exponent, &self.modulus)
    }

    pub fn decrypt(&self, ciphertext: &BigInteger) -> CoreResult<BigInteger> {
        let d = self
            .private_exponent
            .as_ref()
            .ok_or(CoreError::MissingPrivateExponent)?;
        if *ciphertext >= self.modulus {
            return Err(CoreError::MessageTooLarge);
        }
        ciphertext.mod_pow(d, &self.modulus)
    }

    /// Encrypt raw bytes and left-pad the result to the modulus length.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> CoreResult<Vec<u8>> {
        let c = self.encrypt(&BigInteger::from_bytes_be(plaintext))?;
        Ok(c.to_bytes_padded(self.modulus_len()))
    }

    /// Inverse of [`encrypt_bytes`](Self::encrypt_bytes). Leading zero
    /// bytes of the plaintext are not recoverable.
    pub fn decrypt_bytes(&self, ciphertext: &[u8]) -> CoreResult<Vec<u8>> {
        let m = self.decrypt(&BigInteger::from_bytes_be(ciphertext))?;
        if m.is_zero() {
            return Ok(Vec::new());
        }
        Ok(m.as_bytes().to_vec())
    }

    pub fn public_der(&self) -> Vec<u8> {
        der::encode_sequence(&[
            der::encode_integer(&self.modulus),
            der::encode_integer(&self.public_exponent),
        ])
    }

    pub fn private_der(&self) -> CoreResult<Vec<u8>> {
        let d = self
            .private_exponent
            .as_ref()
            .ok_or(CoreError::MissingPrivateExponent)?;
        Ok(der::encode_sequence(&[
            der::encode_integer(&self.modulus),
            der::encode_integer(&self.public_exponent),
            der::encode_integer(d),
        ]))
    }

    pub fn export_public_pem(&self) -> String {
        der::to_pem(PUBLIC_PEM_LABEL, &self.public_der())
    }

    pub fn export_private_pem(&self) -> CoreResult<String> {
        Ok(der::to_pem(PRIVATE_PEM_LABEL, &self.private_der()?))
    }

    /// Parse `SEQUENCE { n, e }` or `SEQUENCE { n, e, d }`.
    pub fn from_der(bytes: &[u8]) -> CoreResult<Self> {
        let mut values = DerReader::new(bytes).read_integer_sequence()?.into_iter();
        match (values.next(), values.next(), values.next(), values.next()) {
            (Some(n), Some(e), d, None) => {
                if n.is_zero() || e.is_zero() {
                    return Err(CoreError::encoding("zero modulus or exponent"));
                }
                Ok(Self {
                    modulus: n,
                    public_exponent: e,
                    private_exponent: d,
                })
            }
            _ => Err(CoreError::encoding("expected 2 or 3 INTEGERs")),
        }
    }

    /// Accepts either PEM label.
    pub fn from_pem(pem: &str) -> CoreResult<Self> {
        if pem.contains(PRIVATE_PEM_LABEL) {
            Self::from_der(&der::from_pem(PRIVATE_PEM_LABEL, pem)?)
        } else {
            Self::from_der(&der::from_pem(PUBLIC_PEM_LABEL, pem)?)
        }
    }
}

impl fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("bits", &self.modulus.bit_len())
            .field("public_exponent", &self.public_exponent)
            .field("has_private", &self.has_private())
            .finish()
    }
}

/// Random odd `bits`-bit candidate with the top bit set, retried until it
/// passes Miller–Rabin. `bits` is at least 256.
fn random_prime(bits: usize) -> BigInteger {
    let len = bits.div_ceil(8);
    let top = (bits - 1) % 8;
    let mut rng = rand::rng();
    let mut buf = vec![0u8; len];
    loop {
        rng.fill_bytes(&mut buf);
        buf[0] &= 0xFF >> (7 - top);
        // top two bits set so p·q has exactly 2·bits bits
        buf[0] |= 1 << top;
        if top > 0 {
            buf[0] |= 1 << (top - 1);
        } else if len > 1 {
            buf[1] |= 0x80;
        }
        buf[len - 1] |= 1;
        let candidate = BigInteger::from_bytes_be(&buf);
        if candidate.is_probable_prime(DEFAULT_ROUNDS) {
            return candidate;
        }
    }
}
