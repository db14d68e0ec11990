//! Cross-checks against num-bigint as the trusted reference.

use drda_core::bigint::KARATSUBA_THRESHOLD;
use drda_core::{BigInteger, CoreError, RsaKeyPair};
use num_bigint::BigUint;
use pretty_assertions::assert_eq;
use rand::RngCore;

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf[0] |= 0x01;
    buf
}

fn reference(n: &BigInteger) -> BigUint {
    BigUint::from_bytes_be(n.as_bytes())
}

#[test]
fn test_add_then_subtract_recovers_operands() {
    for (la, lb) in [(1, 1), (3, 17), (32, 31), (64, 200)] {
        let a = BigInteger::from_bytes_be(&random_bytes(la));
        let b = BigInteger::from_bytes_be(&random_bytes(lb));
        let sum = a.add(&b);
        assert_eq!(sum.subtract(&b).unwrap(), a);
        assert_eq!(sum.subtract(&a).unwrap(), b);
        assert_eq!(reference(&sum), reference(&a) + reference(&b));
    }
}

#[test]
fn test_multiply_paths_agree_across_threshold() {
    assert_eq!(KARATSUBA_THRESHOLD, 32);
    for len in [16, 31, 32, 64, 128] {
        for other in [len, len / 2 + 1, 33] {
            let a = BigInteger::from_bytes_be(&random_bytes(len));
            let b = BigInteger::from_bytes_be(&random_bytes(other));
            let school = a.multiply_schoolbook(&b);
            let kara = a.multiply_karatsuba(&b);
            assert_eq!(school, kara, "len {len} x {other}");
            assert_eq!(a.multiply(&b), school);
            assert_eq!(reference(&school), reference(&a) * reference(&b));
        }
    }
}

#[test]
fn test_divmod_matches_reference() {
    for (la, lb) in [(8, 3), (64, 32), (128, 17), (40, 40), (5, 9)] {
        let a = BigInteger::from_bytes_be(&random_bytes(la));
        let b = BigInteger::from_bytes_be(&random_bytes(lb));
        let (q, r) = a.divmod(&b).unwrap();
        assert_eq!(reference(&q), reference(&a) / reference(&b));
        assert_eq!(reference(&r), reference(&a) % reference(&b));
        assert!(r < b);
    }
}

#[test]
fn test_mod_pow_matches_reference() {
    let n = BigInteger::from_bytes_be(&random_bytes(64));
    for exp_len in [1, 2, 64] {
        let a = BigInteger::from_bytes_be(&random_bytes(48));
        let e = BigInteger::from_bytes_be(&random_bytes(exp_len));
        let got = a.mod_pow(&e, &n).unwrap();
        let want = reference(&a).modpow(&reference(&e), &reference(&n));
        assert_eq!(reference(&got), want);
    }
}

#[test]
fn test_decimal_matches_reference() {
    let a = BigInteger::from_bytes_be(&random_bytes(40));
    assert_eq!(a.to_string(), reference(&a).to_string());
    assert_eq!(format!("{a:x}"), reference(&a).to_str_radix(16));
}

#[test]
fn test_known_primes_and_composites() {
    for p in [61u64, 7919, 104729] {
        assert!(BigInteger::from(p).is_probable_prime(10));
    }
    for c in [4u64, 100, 999] {
        assert!(!BigInteger::from(c).is_probable_prime(10));
    }
}

#[test]
fn test_rsa_round_trip_512() {
    let key = RsaKeyPair::generate(512).unwrap();
    assert_eq!(key.modulus().bit_len(), 512);
    for m in [1u64, 2, 65537, u64::MAX] {
        let m = BigInteger::from(m);
        let c = key.encrypt(&m).unwrap();
        assert_eq!(key.decrypt(&c).unwrap(), m);
    }
    let below_n = key.modulus().subtract(&BigInteger::one()).unwrap();
    let c = key.encrypt(&below_n).unwrap();
    assert_eq!(key.decrypt(&c).unwrap(), below_n);
}

#[test]
fn test_rsa_odd_bit_length_is_exact() {
    let key = RsaKeyPair::generate(513).unwrap();
    assert_eq!(key.modulus().bit_len(), 513);
    let m = BigInteger::from(424242u64);
    assert_eq!(key.decrypt(&key.encrypt(&m).unwrap()).unwrap(), m);
}

#[test]
fn test_rsa_round_trip_1024() {
    let key = RsaKeyPair::generate(1024).unwrap();
    assert_eq!(key.modulus().bit_len(), 1024);
    let secret = b"correct horse battery staple";
    let cipher = key.encrypt_bytes(secret).unwrap();
    assert_eq!(cipher.len(), key.modulus_len());
    assert_eq!(key.decrypt_bytes(&cipher).unwrap(), secret.to_vec());
}

#[test]
fn test_rsa_pem_export_import() {
    let key = RsaKeyPair::generate(512).unwrap();
    let public_pem = key.export_public_pem();
    assert!(public_pem.starts_with("-----BEGIN RSA PUBLIC KEY-----\n"));
    assert!(public_pem.lines().all(|l| l.len() <= 64));
    let public = RsaKeyPair::from_pem(&public_pem).unwrap();
    assert_eq!(public, key.public_key());

    let private_pem = key.export_private_pem().unwrap();
    assert!(private_pem.contains("RSA PRIVATE KEY"));
    assert_eq!(RsaKeyPair::from_pem(&private_pem).unwrap(), key);

    assert_eq!(
        public.export_private_pem(),
        Err(CoreError::MissingPrivateExponent)
    );
}
