//! Column and parameter values.
//!
//! Each value is `0xFF` for NULL, otherwise `0x00 | type | len:u16 | bytes`.

use super::error::{DecodeError, EncodeError};
use bytes::{BufMut, BytesMut};

pub const NULL_INDICATOR: u8 = 0xFF;
pub const PRESENT_INDICATOR: u8 = 0x00;

/// Value type tags.
pub mod type_code {
    pub const FLOAT8: u8 = 0x0A;
    pub const BIGINT: u8 = 0x16;
    pub const VARCHAR: u8 = 0x32;
    pub const VARBYTE: u8 = 0x3E;
    pub const BOOLEAN: u8 = 0xBE;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    BigInt(i64),
    Double(f64),
    Varchar(String),
    Varbyte(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let mut scratch = [0u8; 8];
        let (tag, bytes): (u8, &[u8]) = match self {
            Value::Null => {
                buf.put_u8(NULL_INDICATOR);
                return Ok(());
            }
            Value::BigInt(v) => {
                scratch = v.to_be_bytes();
                (type_code::BIGINT, &scratch[..])
            }
            Value::Double(v) => {
                scratch = v.to_bits().to_be_bytes();
                (type_code::FLOAT8, &scratch[..])
            }
            Value::Boolean(v) => {
                scratch[0] = *v as u8;
                (type_code::BOOLEAN, &scratch[..1])
            }
            Value::Varchar(s) => (type_code::VARCHAR, s.as_bytes()),
            Value::Varbyte(b) => (type_code::VARBYTE, b.as_slice()),
        };
        let len = u16::try_from(bytes.len()).map_err(|_| EncodeError::TooLarge {
            what: "value",
            len: bytes.len(),
        })?;
        buf.put_u8(PRESENT_INDICATOR);
        buf.put_u8(tag);
        buf.put_u16(len);
        buf.put_slice(bytes);
        Ok(())
    }

    /// Decode one value from the front of `buf`, returning it and the number
    /// of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Value, usize), DecodeError> {
        let Some(&indicator) = buf.first() else {
            return Err(DecodeError::truncated("value", 1, 0));
        };
        if indicator == NULL_INDICATOR {
            return Ok((Value::Null, 1));
        }
        if buf.len() < 4 {
            return Err(DecodeError::truncated("value header", 4, buf.len()));
        }
        let tag = buf[1];
        let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < 4 + len {
            return Err(DecodeError::truncated("value", 4 + len, buf.len()));
        }
        let data = &buf[4..4 + len];
        let value = match tag {
            type_code::BIGINT => Value::BigInt(i64::from_be_bytes(fixed(data)?)),
            type_code::FLOAT8 => {
                Value::Double(f64::from_bits(u64::from_be_bytes(fixed(data)?)))
            }
            type_code::BOOLEAN => match data {
                [b] => Value::Boolean(*b != 0),
                _ => return Err(DecodeError::truncated("BOOLEAN", 1, data.len())),
            },
            type_code::VARCHAR => Value::Varchar(
                String::from_utf8(data.to_vec()).map_err(|_| DecodeError::InvalidUtf8("VARCHAR"))?,
            ),
            type_code::VARBYTE => Value::Varbyte(data.to_vec()),
            other => return Err(DecodeError::UnknownValueType(other)),
        };
        Ok((value, 4 + len))
    }

    /// Decode values until `buf` is exhausted.
    pub fn decode_all(mut buf: &[u8]) -> Result<Vec<Value>, DecodeError> {
        let mut values = Vec::new();
        while !buf.is_empty() {
            let (value, used) = Value::decode(buf)?;
            values.push(value);
            buf = &buf[used..];
        }
        Ok(values)
    }
}

fn fixed(data: &[u8]) -> Result<[u8; 8], DecodeError> {
    data.try_into()
        .map_err(|_| DecodeError::truncated("8-byte value", 8, data.len()))
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::BigInt(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Varbyte(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Varchar(s) => f.write_str(s),
            Value::Varbyte(b) => {
                f.write_str("0x")?;
                b.iter().try_for_each(|byte| write!(f, "{:02x}", byte))
            }
            Value::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self.values.get(idx)? {
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        match self.values.get(idx)? {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_str(&self, idx: usize) -> Option<&str> {
        match self.values.get(idx)? {
            Value::Varchar(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        match self.values.get(idx)? {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_bytes(&self, idx: usize) -> Option<&[u8]> {
        match self.values.get(idx)? {
            Value::Varbyte(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_single_byte() {
        let mut buf = BytesMut::new();
        Value::Null.encode(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0xFF]);
        assert_eq!(Value::decode(&buf).unwrap(), (Value::Null, 1));
    }

    #[test]
    fn test_bigint_layout() {
        let mut buf = BytesMut::new();
        Value::BigInt(-2).encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x00, 0x16, 0x00, 0x08, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]
        );
    }

    #[test]
    fn test_decode_mixed_row() {
        let values = vec![
            Value::from("héllo"),
            Value::from(Some(3.5f64)),
            Value::from(None::<i64>),
            Value::from(true),
            Value::from(vec![1u8, 2, 3]),
        ];
        let mut buf = BytesMut::new();
        for v in &values {
            v.encode(&mut buf).unwrap();
        }
        assert_eq!(Value::decode_all(&buf).unwrap(), values);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let buf = [0x00, 0x99, 0x00, 0x00];
        assert_eq!(Value::decode(&buf), Err(DecodeError::UnknownValueType(0x99)));
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![Value::from(7i64), Value::from("x"), Value::Null]);
        assert_eq!(row.get_i64(0), Some(7));
        assert_eq!(row.get_str(1), Some("x"));
        assert_eq!(row.get_str(0), None);
        assert!(row.get(2).is_some_and(Value::is_null));
        assert_eq!(row.get(3), None);
    }
}
