//! Typed view of reply frames.

use super::code_points as cp;
use super::error::DecodeError;
use super::frame::{Frame, FrameType, Parameter, ParameterList};
use super::value::{Row, Value};
use bytes::Bytes;

/// Reply to a handshake or security command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReply {
    pub code_point: u16,
    pub success: bool,
    pub parameters: Vec<Parameter>,
}

impl HandshakeReply {
    pub fn param(&self, code_point: u16) -> Option<&Bytes> {
        self.parameters.find(code_point)
    }

    pub fn string(&self, code_point: u16) -> Result<Option<String>, DecodeError> {
        self.parameters.find_string(code_point)
    }

    pub fn u16(&self, code_point: u16) -> Result<Option<u16>, DecodeError> {
        self.parameters.find_u16(code_point)
    }
}

/// SQL communication area: status of an executed statement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlCard {
    pub sqlcode: i32,
    pub sqlstate: String,
    pub rows_affected: i64,
    pub message: String,
}

impl SqlCard {
    pub fn ok(rows_affected: i64) -> Self {
        Self {
            sqlcode: 0,
            sqlstate: "00000".to_string(),
            rows_affected,
            message: String::new(),
        }
    }

    pub fn error(sqlcode: i32, sqlstate: &str, message: &str) -> Self {
        Self {
            sqlcode,
            sqlstate: sqlstate.to_string(),
            rows_affected: 0,
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.sqlcode < 0
    }

    /// `sqlcode:i32 | sqlstate:5 | rows:i64 | msglen:u16 | message`
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        const FIXED: usize = 4 + 5 + 8 + 2;
        if buf.len() < FIXED {
            return Err(DecodeError::truncated("SQLCARD", FIXED, buf.len()));
        }
        let sqlcode = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let sqlstate = std::str::from_utf8(&buf[4..9])
            .map_err(|_| DecodeError::InvalidUtf8("SQLSTATE"))?
            .to_string();
        let mut rows = [0u8; 8];
        rows.copy_from_slice(&buf[9..17]);
        let msg_len = u16::from_be_bytes([buf[17], buf[18]]) as usize;
        if buf.len() != FIXED + msg_len {
            return Err(DecodeError::LengthMismatch {
                what: "SQLCARD message",
                declared: msg_len,
                actual: buf.len() - FIXED,
            });
        }
        let message = std::str::from_utf8(&buf[FIXED..])
            .map_err(|_| DecodeError::InvalidUtf8("SQLCARD message"))?
            .to_string();
        Ok(Self {
            sqlcode,
            sqlstate,
            rows_affected: i64::from_be_bytes(rows),
            message,
        })
    }
}

/// A decoded reply frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// EXCSATRD, ACCSECRD, SECCHKRM or ACCRDBRM.
    Handshake(HandshakeReply),
    /// QRYDTA: one SQLDTARD per row.
    Rows(Vec<Row>),
    /// SQLCARD
    Status(SqlCard),
    /// SQLDARD: handle of a prepared statement.
    Prepared { handle: u16 },
}

impl Reply {
    /// Map a parsed frame to its typed reply. Request frames and unknown
    /// code points are decode errors.
    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        if frame.header.frame_type == FrameType::Request {
            return Err(DecodeError::UnexpectedFrameType(
                frame.header.frame_type as u8,
            ));
        }
        match frame.code_point {
            cp::EXCSATRD => Ok(Reply::Handshake(HandshakeReply {
                code_point: frame.code_point,
                success: true,
                parameters: frame.parameters()?,
            })),
            cp::ACCSECRD | cp::SECCHKRM => {
                let parameters = frame.parameters()?;
                let code = parameters.find_u16(cp::SECCHKCD)?;
                let success = match (frame.code_point, code) {
                    (cp::SECCHKRM, None) => return Err(DecodeError::MissingParameter(cp::SECCHKCD)),
                    (_, code) => code.unwrap_or(0) == 0,
                };
                Ok(Reply::Handshake(HandshakeReply {
                    code_point: frame.code_point,
                    success,
                    parameters,
                }))
            }
            cp::ACCRDBRM => {
                let parameters = frame.parameters()?;
                let severity = parameters.find_u16(cp::SVRCOD)?.unwrap_or(0);
                Ok(Reply::Handshake(HandshakeReply {
                    code_point: frame.code_point,
                    success: severity < cp::SVRCOD_ERROR,
                    parameters,
                }))
            }
            cp::QRYDTA => {
                let rows = frame
                    .parameters()?
                    .iter()
                    .filter(|p| p.code_point == cp::SQLDTARD)
                    .map(|p| Value::decode_all(&p.data).map(Row::new))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Reply::Rows(rows))
            }
            cp::SQLCARD => Ok(Reply::Status(SqlCard::decode(&frame.payload)?)),
            cp::SQLDARD => {
                let handle = frame
                    .parameters()?
                    .find_u16(cp::PKGSN)?
                    .ok_or(DecodeError::MissingParameter(cp::PKGSN))?;
                Ok(Reply::Prepared { handle })
            }
            other => Err(DecodeError::UnexpectedCodePoint {
                expected: "reply object",
                found: other,
            }),
        }
    }

    /// Decode and require a handshake reply with the given code point.
    pub fn expect_handshake(
        frame: &Frame,
        code_point: u16,
        expected: &'static str,
    ) -> Result<HandshakeReply, DecodeError> {
        frame.expect(code_point, expected)?;
        match Reply::decode(frame)? {
            Reply::Handshake(reply) => Ok(reply),
            _ => Err(DecodeError::UnexpectedCodePoint {
                expected,
                found: frame.code_point,
            }),
        }
    }
}
