//! Minimal ASN.1 DER and PEM armor for RSA key material.
//!
//! Only the two shapes RSA keys need are supported: unsigned `INTEGER`
//! and `SEQUENCE` of them.

use crate::bigint::BigInteger;
use crate::error::{CoreError, CoreResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_SEQUENCE: u8 = 0x30;

const PEM_LINE: usize = 64;

/// Short form below 128, otherwise `0x80 | n` followed by `n` length bytes.
pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes: Vec<u8> = len
        .to_be_bytes()
        .iter()
        .copied()
        .skip_while(|&b| b == 0)
        .collect();
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(0x80 | bytes.len() as u8);
    out.extend_from_slice(&bytes);
    out
}

/// A zero byte is prepended when the high bit is set so the value stays
/// non-negative.
pub fn encode_integer(value: &BigInteger) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut content = Vec::with_capacity(bytes.len() + 1);
    if bytes[0] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(bytes);
    tlv(TAG_INTEGER, &content)
}

pub fn encode_sequence(items: &[Vec<u8>]) -> Vec<u8> {
    let content: Vec<u8> = items.concat();
    tlv(TAG_SEQUENCE, &content)
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = encode_length(content.len());
    let mut out = Vec::with_capacity(1 + len.len() + content.len());
    out.push(tag);
    out.extend_from_slice(&len);
    out.extend_from_slice(content);
    out
}

/// Cursor over DER input.
pub struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn byte(&mut self) -> CoreResult<u8> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| CoreError::encoding("unexpected end of DER input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn length(&mut self) -> CoreResult<usize> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let n = (first & 0x7F) as usize;
        if n == 0 || n > std::mem::size_of::<usize>() {
            return Err(CoreError::encoding(format!("unsupported length-of-length {n}")));
        }
        let mut len = 0usize;
        for _ in 0..n {
            len = (len << 8) | self.byte()? as usize;
        }
        Ok(len)
    }

    /// Read one element with the given tag and return its content.
    pub fn read(&mut self, tag: u8) -> CoreResult<&'a [u8]> {
        let found = self.byte()?;
        if found != tag {
            return Err(CoreError::encoding(format!(
                "expected tag 0x{tag:02x}, found 0x{found:02x}"
            )));
        }
        let len = self.length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| CoreError::encoding("DER length exceeds input"))?;
        let content = &self.buf[self.pos..end];
        self.pos = end;
        Ok(content)
    }

    pub fn read_integer(&mut self) -> CoreResult<BigInteger> {
        let content = self.read(TAG_INTEGER)?;
        if content.is_empty() {
            return Err(CoreError::encoding("empty INTEGER"));
        }
        if content[0] & 0x80 != 0 {
            return Err(CoreError::encoding("negative INTEGER"));
        }
        Ok(BigInteger::from_bytes_be(content))
    }

    /// Integers inside one `SEQUENCE`; trailing bytes after it are rejected.
    pub fn read_integer_sequence(mut self) -> CoreResult<Vec<BigInteger>> {
        let content = self.read(TAG_SEQUENCE)?;
        if !self.is_empty() {
            return Err(CoreError::encoding("trailing bytes after SEQUENCE"));
        }
        let mut inner = DerReader::new(content);
        let mut values = Vec::new();
        while !inner.is_empty() {
            values.push(inner.read_integer()?);
        }
        Ok(values)
    }
}

/// Base64 of `der` between `-----BEGIN/END {label}-----`, 64 characters a line.
pub fn to_pem(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in encoded.as_bytes().chunks(PEM_LINE) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

pub fn from_pem(label: &str, pem: &str) -> CoreResult<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let start = pem
        .find(&begin)
        .ok_or_else(|| CoreError::encoding(format!("missing '{begin}'")))?
        + begin.len();
    let stop = pem[start..]
        .find(&end)
        .ok_or_else(|| CoreError::encoding(format!("missing '{end}'")))?
        + start;
    let body: String = pem[start..stop]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD
        .decode(body)
        .map_err(|e| CoreError::encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_length_forms() {
        assert_eq!(encode_length(0x7F), vec![0x7F]);
        assert_eq!(encode_length(0x80), vec![0x81, 0x80]);
        assert_eq!(encode_length(0x0102), vec![0x82, 0x01, 0x02]);
    }

    #[test]
    fn test_integer_pads_high_bit() {
        assert_eq!(
            encode_integer(&BigInteger::from(0x80u32)),
            vec![0x02, 0x02, 0x00, 0x80]
        );
        assert_eq!(
            encode_integer(&BigInteger::from(0x7Fu32)),
            vec![0x02, 0x01, 0x7F]
        );
        assert_eq!(encode_integer(&BigInteger::zero()), vec![0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_sequence_reads_back() {
        let values = vec![BigInteger::from(0xC0FFEEu32), BigInteger::from(65537u32)];
        let der = encode_sequence(&values.iter().map(encode_integer).collect::<Vec<_>>());
        assert_eq!(der[0], TAG_SEQUENCE);
        let parsed = DerReader::new(&der).read_integer_sequence().unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn test_truncated_input_rejected() {
        let der = encode_sequence(&[encode_integer(&BigInteger::from(5u32))]);
        let err = DerReader::new(&der[..der.len() - 1]).read_integer_sequence();
        assert!(matches!(err, Err(CoreError::Encoding(_))));
    }

    #[test]
    fn test_pem_wraps_at_64() {
        let der = vec![0xABu8; 100];
        let pem = to_pem("RSA PUBLIC KEY", &der);
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines[0], "-----BEGIN RSA PUBLIC KEY-----");
        assert_eq!(lines[1].len(), 64);
        assert_eq!(*lines.last().unwrap(), "-----END RSA PUBLIC KEY-----");
        assert_eq!(from_pem("RSA PUBLIC KEY", &pem).unwrap(), der);
        assert!(from_pem("RSA PRIVATE KEY", &pem).is_err());
    }
}
