//! DSS framing: the 6-byte header, DDM objects and their parameters.
//!
//! ```text
//! frame     = length:u16 flags:u8 type:u8 correlation:u16 object
//! object    = length:u16 code_point:u16 payload
//! parameter = length:u16 code_point:u16 data
//! ```
//!
//! Every length counts its own 4 (or 6) header bytes plus the payload.

use super::error::{DecodeError, EncodeError};
use bytes::{BufMut, Bytes, BytesMut};

pub const HEADER_LEN: usize = 6;
pub const DDM_HEADER_LEN: usize = 4;

/// The only flags value this client sends or accepts.
pub const DSS_FLAGS: u8 = 0xD0;

/// Largest value a 16-bit length field can describe.
pub const MAX_LENGTH: usize = u16::MAX as usize;

/// DSS type, the low nibble of the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Request = 1,
    Reply = 2,
    Object = 3,
}

impl FrameType {
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte & 0x0F {
            1 => Ok(Self::Request),
            2 => Ok(Self::Reply),
            3 => Ok(Self::Object),
            _ => Err(DecodeError::UnexpectedFrameType(byte)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u16,
    pub flags: u8,
    pub frame_type: FrameType,
    pub correlation_id: u16,
}

/// `length | flags | type | correlation`, big-endian.
pub fn build_frame_header(
    total_length: u16,
    correlation_id: u16,
    flags: u8,
    frame_type: FrameType,
) -> [u8; HEADER_LEN] {
    let len = total_length.to_be_bytes();
    let corr = correlation_id.to_be_bytes();
    [len[0], len[1], flags, frame_type as u8, corr[0], corr[1]]
}

/// `length(2) | code_point(2) | data`
pub fn build_parameter(code_point: u16, data: &[u8]) -> Result<Bytes, EncodeError> {
    let mut buf = BytesMut::with_capacity(DDM_HEADER_LEN + data.len());
    put_parameter(&mut buf, code_point, data)?;
    Ok(buf.freeze())
}

pub(crate) fn put_parameter(
    buf: &mut BytesMut,
    code_point: u16,
    data: &[u8],
) -> Result<(), EncodeError> {
    let len = checked_len("parameter", DDM_HEADER_LEN + data.len())?;
    buf.put_u16(len);
    buf.put_u16(code_point);
    buf.put_slice(data);
    Ok(())
}

fn checked_len(what: &'static str, len: usize) -> Result<u16, EncodeError> {
    u16::try_from(len).map_err(|_| EncodeError::TooLarge { what, len })
}

/// Wrap an object payload (already-encoded parameters, or raw data for
/// SQLCARD) into a complete frame.
pub fn build_frame(
    frame_type: FrameType,
    correlation_id: u16,
    code_point: u16,
    payload: &[u8],
) -> Result<BytesMut, EncodeError> {
    let object_len = checked_len("object", DDM_HEADER_LEN + payload.len())?;
    let total = checked_len("frame", HEADER_LEN + object_len as usize)?;
    let mut buf = BytesMut::with_capacity(total as usize);
    buf.put_slice(&build_frame_header(
        total,
        correlation_id,
        DSS_FLAGS,
        frame_type,
    ));
    buf.put_u16(object_len);
    buf.put_u16(code_point);
    buf.put_slice(payload);
    Ok(buf)
}

pub fn parse_frame_header(buf: &[u8]) -> Result<FrameHeader, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::truncated("frame header", HEADER_LEN, buf.len()));
    }
    let length = u16::from_be_bytes([buf[0], buf[1]]);
    if (length as usize) < HEADER_LEN + DDM_HEADER_LEN {
        return Err(DecodeError::LengthMismatch {
            what: "frame",
            declared: length as usize,
            actual: buf.len(),
        });
    }
    let flags = buf[2];
    if flags != DSS_FLAGS {
        return Err(DecodeError::BadFlags(flags));
    }
    Ok(FrameHeader {
        length,
        flags,
        frame_type: FrameType::from_byte(buf[3])?,
        correlation_id: u16::from_be_bytes([buf[4], buf[5]]),
    })
}

/// One parameter inside an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub code_point: u16,
    pub data: Bytes,
}

/// Split a payload into parameters by the length-prefix convention.
pub fn parse_parameters(payload: &Bytes) -> Result<Vec<Parameter>, DecodeError> {
    let mut params = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let rest = payload.len() - pos;
        if rest < DDM_HEADER_LEN {
            return Err(DecodeError::truncated("parameter header", DDM_HEADER_LEN, rest));
        }
        let len = u16::from_be_bytes([payload[pos], payload[pos + 1]]) as usize;
        if len < DDM_HEADER_LEN || len > rest {
            return Err(DecodeError::LengthMismatch {
                what: "parameter",
                declared: len,
                actual: rest,
            });
        }
        let code_point = u16::from_be_bytes([payload[pos + 2], payload[pos + 3]]);
        params.push(Parameter {
            code_point,
            data: payload.slice(pos + DDM_HEADER_LEN..pos + len),
        });
        pos += len;
    }
    Ok(params)
}

/// A parsed frame: header plus its single DDM object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub code_point: u16,
    pub payload: Bytes,
}

impl Frame {
    /// Parse a complete frame. `buf` must hold exactly one frame.
    pub fn parse(buf: Bytes) -> Result<Self, DecodeError> {
        let header = parse_frame_header(&buf)?;
        if header.length as usize != buf.len() {
            return Err(DecodeError::LengthMismatch {
                what: "frame",
                declared: header.length as usize,
                actual: buf.len(),
            });
        }
        let object = buf.slice(HEADER_LEN..);
        let object_len = u16::from_be_bytes([object[0], object[1]]) as usize;
        if object_len != object.len() {
            return Err(DecodeError::LengthMismatch {
                what: "object",
                declared: object_len,
                actual: object.len(),
            });
        }
        Ok(Self {
            header,
            code_point: u16::from_be_bytes([object[2], object[3]]),
            payload: object.slice(DDM_HEADER_LEN..),
        })
    }

    pub fn correlation_id(&self) -> u16 {
        self.header.correlation_id
    }

    pub fn parameters(&self) -> Result<Vec<Parameter>, DecodeError> {
        parse_parameters(&self.payload)
    }

    /// Fail unless the object carries `code_point`.
    pub fn expect(&self, code_point: u16, expected: &'static str) -> Result<(), DecodeError> {
        if self.code_point != code_point {
            return Err(DecodeError::UnexpectedCodePoint {
                expected,
                found: self.code_point,
            });
        }
        Ok(())
    }
}

/// Lookup helpers over a parameter list.
pub trait ParameterList {
    fn find(&self, code_point: u16) -> Option<&Bytes>;

    fn require(&self, code_point: u16) -> Result<&Bytes, DecodeError> {
        self.find(code_point)
            .ok_or(DecodeError::MissingParameter(code_point))
    }

    fn find_u16(&self, code_point: u16) -> Result<Option<u16>, DecodeError> {
        match self.find(code_point) {
            None => Ok(None),
            Some(data) if data.len() == 2 => Ok(Some(u16::from_be_bytes([data[0], data[1]]))),
            Some(data) => Err(DecodeError::invalid(
                code_point,
                format!("expected 2 bytes, got {}", data.len()),
            )),
        }
    }

    /// UTF-8 string, with one trailing NUL stripped if present.
    fn find_string(&self, code_point: u16) -> Result<Option<String>, DecodeError> {
        match self.find(code_point) {
            None => Ok(None),
            Some(data) => {
                let bytes = data.strip_suffix(&[0u8]).unwrap_or(&data[..]);
                String::from_utf8(bytes.to_vec())
                    .map(Some)
                    .map_err(|_| DecodeError::invalid(code_point, "invalid UTF-8"))
            }
        }
    }
}

impl ParameterList for [Parameter] {
    fn find(&self, code_point: u16) -> Option<&Bytes> {
        self.iter()
            .find(|p| p.code_point == code_point)
            .map(|p| &p.data)
    }
}

impl ParameterList for Vec<Parameter> {
    fn find(&self, code_point: u16) -> Option<&Bytes> {
        self.as_slice().find(code_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let h = build_frame_header(0x0102, 0x0304, DSS_FLAGS, FrameType::Request);
        assert_eq!(h, [0x01, 0x02, 0xD0, 0x01, 0x03, 0x04]);
    }

    #[test]
    fn test_parameter_layout() {
        let p = build_parameter(0x2110, b"DB").unwrap();
        assert_eq!(&p[..], &[0x00, 0x06, 0x21, 0x10, b'D', b'B']);
    }

    #[test]
    fn test_parameter_too_large() {
        let data = vec![0u8; MAX_LENGTH];
        assert!(matches!(
            build_parameter(0x2414, &data),
            Err(EncodeError::TooLarge { what: "parameter", .. })
        ));
    }

    #[test]
    fn test_frame_parse_checks_lengths() {
        let payload = build_parameter(0x2110, b"SAMPLE").unwrap();
        let frame = build_frame(FrameType::Reply, 7, 0x2201, &payload).unwrap();
        let parsed = Frame::parse(frame.clone().freeze()).unwrap();
        assert_eq!(parsed.correlation_id(), 7);
        assert_eq!(parsed.code_point, 0x2201);
        assert_eq!(parsed.parameters().unwrap()[0].data, Bytes::from_static(b"SAMPLE"));

        let mut short = frame.clone();
        short.truncate(frame.len() - 1);
        assert!(matches!(
            Frame::parse(short.freeze()),
            Err(DecodeError::LengthMismatch { what: "frame", .. })
        ));
    }

    #[test]
    fn test_bad_flags_rejected() {
        let mut frame = build_frame(FrameType::Reply, 1, 0x2201, &[]).unwrap();
        frame[2] = 0xC0;
        assert_eq!(
            Frame::parse(frame.freeze()),
            Err(DecodeError::BadFlags(0xC0))
        );
    }

    #[test]
    fn test_parameter_overrun_rejected() {
        let payload = Bytes::from_static(&[0x00, 0x09, 0x21, 0x10, b'x']);
        assert!(matches!(
            parse_parameters(&payload),
            Err(DecodeError::LengthMismatch { what: "parameter", .. })
        ));
    }
}
