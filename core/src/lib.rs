//! Arbitrary-precision integers and RSA key material for DRDA clients.
//!
//! Everything here is pure and synchronous: no I/O, no platform bignum
//! or crypto library. The async driver lives in `drda-client`.
//!
//! ```
//! use drda_core::{BigInteger, RsaKeyPair};
//!
//! let key = RsaKeyPair::from_primes(&BigInteger::from(61u32), &BigInteger::from(53u32)).unwrap();
//! let c = key.encrypt(&BigInteger::from(42u32)).unwrap();
//! assert_eq!(key.decrypt(&c).unwrap(), BigInteger::from(42u32));
//! ```

pub mod bigint;
pub mod der;
pub mod error;
pub mod rsa;

pub use bigint::BigInteger;
pub use error::{CoreError, CoreResult};
pub use rsa::RsaKeyPair;

pub mod prelude {
    pub use crate::bigint::{BigInteger, ExtendedGcd, Signed};
    pub use crate::error::*;
    pub use crate::rsa::RsaKeyPair;
}
