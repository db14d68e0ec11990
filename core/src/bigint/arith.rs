//! Digit kernels.
//!
//! Every function here works on little-endian base-256 digit slices with
//! no high zero digits (zero is the empty slice). `BigInteger` converts at
//! the boundary, so the kernels never see the most-significant-first form.

use std::cmp::Ordering;

/// Operands shorter than this (in bytes) use grade-school multiplication.
pub const KARATSUBA_THRESHOLD: usize = 32;

pub(super) fn trim(mut digits: Vec<u8>) -> Vec<u8> {
    while digits.last() == Some(&0) {
        digits.pop();
    }
    digits
}

pub(super) fn cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len()
        .cmp(&b.len())
        .then_with(|| a.iter().rev().cmp(b.iter().rev()))
}

pub(super) fn add(a: &[u8], b: &[u8]) -> Vec<u8> {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut out = Vec::with_capacity(long.len() + 1);
    let mut carry = 0u16;
    for (i, &x) in long.iter().enumerate() {
        let sum = x as u16 + short.get(i).copied().unwrap_or(0) as u16 + carry;
        out.push(sum as u8);
        carry = sum >> 8;
    }
    if carry > 0 {
        out.push(carry as u8);
    }
    trim(out)
}

/// `a - b`. Caller guarantees `a >= b`.
pub(super) fn sub(a: &[u8], b: &[u8]) -> Vec<u8> {
    debug_assert!(cmp(a, b) != Ordering::Less);
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0i16;
    for (i, &x) in a.iter().enumerate() {
        let mut diff = x as i16 - b.get(i).copied().unwrap_or(0) as i16 - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(diff as u8);
    }
    trim(out)
}

pub(super) fn mul_schoolbook(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0u8; a.len() + b.len()];
    for (i, &x) in a.iter().enumerate() {
        if x == 0 {
            continue;
        }
        let mut carry = 0u32;
        for (j, &y) in b.iter().enumerate() {
            let t = x as u32 * y as u32 + out[i + j] as u32 + carry;
            out[i + j] = t as u8;
            carry = t >> 8;
        }
        let mut k = i + b.len();
        while carry > 0 {
            let t = out[k] as u32 + carry;
            out[k] = t as u8;
            carry = t >> 8;
            k += 1;
        }
    }
    trim(out)
}

/// Karatsuba: split both operands at `m = max_len / 2` bytes, so
/// `a = a1·B^m + a0`, and combine `z2·B^2m + z1·B^m + z0`.
pub(super) fn mul_karatsuba(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.len() < KARATSUBA_THRESHOLD || b.len() < KARATSUBA_THRESHOLD {
        return mul_schoolbook(a, b);
    }
    let m = a.len().max(b.len()) / 2;
    let (a0, a1) = split_at(a, m);
    let (b0, b1) = split_at(b, m);

    let z0 = mul_karatsuba(&a0, &b0);
    let z2 = mul_karatsuba(&a1, &b1);
    let cross = mul_karatsuba(&add(&a0, &a1), &add(&b0, &b1));
    let z1 = sub(&sub(&cross, &z2), &z0);

    let mut out = z0;
    add_shifted(&mut out, &z1, m);
    add_shifted(&mut out, &z2, 2 * m);
    trim(out)
}

fn split_at(digits: &[u8], m: usize) -> (Vec<u8>, Vec<u8>) {
    if m >= digits.len() {
        return (digits.to_vec(), Vec::new());
    }
    (trim(digits[..m].to_vec()), digits[m..].to_vec())
}

/// `out += value · 256^shift`
fn add_shifted(out: &mut Vec<u8>, value: &[u8], shift: usize) {
    if value.is_empty() {
        return;
    }
    if out.len() < shift + value.len() {
        out.resize(shift + value.len(), 0);
    }
    let mut carry = 0u16;
    for (i, &x) in value.iter().enumerate() {
        let sum = out[shift + i] as u16 + x as u16 + carry;
        out[shift + i] = sum as u8;
        carry = sum >> 8;
    }
    let mut k = shift + value.len();
    while carry > 0 {
        if k == out.len() {
            out.push(0);
        }
        let sum = out[k] as u16 + carry;
        out[k] = sum as u8;
        carry = sum >> 8;
        k += 1;
    }
}

pub(super) fn mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    mul_karatsuba(a, b)
}

/// Multiply by a single digit and add another.
pub(super) fn mul_small_add(a: &[u8], factor: u8, addend: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len() + 1);
    let mut carry = addend as u32;
    for &x in a {
        let t = x as u32 * factor as u32 + carry;
        out.push(t as u8);
        carry = t >> 8;
    }
    if carry > 0 {
        out.push(carry as u8);
    }
    trim(out)
}

pub(super) fn divmod_small(u: &[u8], d: u8) -> (Vec<u8>, u8) {
    debug_assert!(d != 0);
    let mut q = vec![0u8; u.len()];
    let mut rem = 0u32;
    for i in (0..u.len()).rev() {
        let cur = (rem << 8) | u[i] as u32;
        q[i] = (cur / d as u32) as u8;
        rem = cur % d as u32;
    }
    (trim(q), rem as u8)
}

pub(super) fn rem_u32(u: &[u8], d: u32) -> u32 {
    let mut rem = 0u64;
    for &digit in u.iter().rev() {
        rem = ((rem << 8) | digit as u64) % d as u64;
    }
    rem as u32
}

/// Long division (Knuth, TAOCP vol. 2, algorithm D) in base 256.
/// Caller guarantees `v` is non-empty.
pub(super) fn divmod(u: &[u8], v: &[u8]) -> (Vec<u8>, Vec<u8>) {
    debug_assert!(!v.is_empty());
    if cmp(u, v) == Ordering::Less {
        return (Vec::new(), u.to_vec());
    }
    if v.len() == 1 {
        let (q, r) = divmod_small(u, v[0]);
        return (q, trim(vec![r]));
    }

    let n = v.len();
    let m = u.len() - n;
    let shift = v[n - 1].leading_zeros();
    let mut vn = shl_bits(v, shift);
    vn.truncate(n);
    let mut un = shl_bits(u, shift);

    let top = vn[n - 1] as u32;
    let second = vn[n - 2] as u32;
    let mut q = vec![0u8; m + 1];

    for j in (0..=m).rev() {
        let num = ((un[j + n] as u32) << 8) | un[j + n - 1] as u32;
        let mut qhat = num / top;
        let mut rhat = num % top;
        while qhat > 0xFF || qhat * second > ((rhat << 8) | un[j + n - 2] as u32) {
            qhat -= 1;
            rhat += top;
            if rhat > 0xFF {
                break;
            }
        }

        let mut borrow = 0i32;
        let mut carry = 0u32;
        for i in 0..n {
            let p = qhat * vn[i] as u32 + carry;
            carry = p >> 8;
            let t = un[i + j] as i32 - (p & 0xFF) as i32 + borrow;
            un[i + j] = t as u8;
            borrow = t >> 8;
        }
        let t = un[j + n] as i32 - carry as i32 + borrow;
        un[j + n] = t as u8;

        // qhat overshot by one: add the divisor back
        if t < 0 {
            qhat -= 1;
            let mut c = 0u32;
            for i in 0..n {
                let s = un[i + j] as u32 + vn[i] as u32 + c;
                un[i + j] = s as u8;
                c = s >> 8;
            }
            un[j + n] = un[j + n].wrapping_add(c as u8);
        }
        q[j] = qhat as u8;
    }

    let r = shr_bits(&un[..n], shift);
    (trim(q), trim(r))
}

/// Shift left by `s < 8` bits. The result is always one digit longer.
fn shl_bits(v: &[u8], s: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() + 1);
    let mut carry = 0u8;
    for &x in v {
        let w = ((x as u16) << s) | carry as u16;
        out.push(w as u8);
        carry = (w >> 8) as u8;
    }
    out.push(carry);
    out
}

fn shr_bits(v: &[u8], s: u32) -> Vec<u8> {
    if s == 0 {
        return v.to_vec();
    }
    (0..v.len())
        .map(|i| {
            let hi = v.get(i + 1).copied().unwrap_or(0);
            (v[i] >> s) | (hi << (8 - s))
        })
        .collect()
}

/// Arbitrary right shift by `bits`.
pub(super) fn shr(v: &[u8], bits: usize) -> Vec<u8> {
    let bytes = bits / 8;
    if bytes >= v.len() {
        return Vec::new();
    }
    trim(shr_bits(&v[bytes..], (bits % 8) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_carries_into_new_digit() {
        assert_eq!(add(&[0xFF, 0xFF], &[0x01]), vec![0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_sub_borrows_across_digits() {
        assert_eq!(sub(&[0x00, 0x00, 0x01], &[0x01]), vec![0xFF, 0xFF]);
        assert!(sub(&[0x05], &[0x05]).is_empty());
    }

    #[test]
    fn test_divmod_needs_add_back() {
        // 0x7FFF_8000_0000 / 0x8000_0001 exercises the qhat correction path
        let u = [0x00, 0x00, 0x00, 0x80, 0xFF, 0x7F];
        let v = [0x01, 0x00, 0x00, 0x80];
        let (q, r) = divmod(&u, &v);
        let back = add(&mul_schoolbook(&q, &v), &r);
        assert_eq!(back, trim(u.to_vec()));
        assert_eq!(cmp(&r, &v), Ordering::Less);
    }

    #[test]
    fn test_shr() {
        assert_eq!(shr(&[0x00, 0x01], 1), vec![0x80]);
        assert_eq!(shr(&[0x00, 0x01], 9), Vec::<u8>::new());
        assert_eq!(shr(&[0x34, 0x12], 8), vec![0x12]);
    }
}
