//! Server-side reply builders.
//!
//! The client never sends these; they exist for in-process servers and
//! protocol tests that need byte-exact replies.

use super::code_points::{self as cp, SecurityMechanism};
use super::decoder::SqlCard;
use super::error::EncodeError;
use super::frame::{FrameType, build_frame, put_parameter};
use super::value::Value;
use bytes::{BufMut, BytesMut};

pub struct ReplyBuilder;

impl ReplyBuilder {
    fn with_params(
        correlation_id: u16,
        code_point: u16,
        params: &[(u16, &[u8])],
    ) -> Result<BytesMut, EncodeError> {
        let mut payload = BytesMut::new();
        for &(param, data) in params {
            put_parameter(&mut payload, param, data)?;
        }
        build_frame(FrameType::Reply, correlation_id, code_point, &payload)
    }

    /// EXCSATRD with server name and external name.
    pub fn server_attributes(
        correlation_id: u16,
        server_name: &str,
        external_name: &str,
    ) -> Result<BytesMut, EncodeError> {
        Self::with_params(
            correlation_id,
            cp::EXCSATRD,
            &[
                (cp::SRVNAM, server_name.as_bytes()),
                (cp::EXTNAM, external_name.as_bytes()),
            ],
        )
    }

    /// ACCSECRD naming the mechanism the server will use, optionally with
    /// its public key (DER) for encrypted passwords.
    pub fn access_security(
        correlation_id: u16,
        mechanism: SecurityMechanism,
        public_key_der: Option<&[u8]>,
    ) -> Result<BytesMut, EncodeError> {
        let code = mechanism.code().to_be_bytes();
        let mut params: Vec<(u16, &[u8])> = vec![(cp::SECMEC, &code[..])];
        if let Some(der) = public_key_der {
            params.push((cp::SECTKN, der));
        }
        Self::with_params(correlation_id, cp::ACCSECRD, &params)
    }

    /// SECCHKRM; `code` 0 means accepted.
    pub fn security_check(correlation_id: u16, code: u16) -> Result<BytesMut, EncodeError> {
        let svrcod: u16 = if code == 0 { 0 } else { cp::SVRCOD_ERROR };
        Self::with_params(
            correlation_id,
            cp::SECCHKRM,
            &[
                (cp::SVRCOD, &svrcod.to_be_bytes()[..]),
                (cp::SECCHKCD, &code.to_be_bytes()[..]),
            ],
        )
    }

    /// ACCRDBRM with the given severity.
    pub fn access_database(
        correlation_id: u16,
        severity: u16,
        product_id: &str,
    ) -> Result<BytesMut, EncodeError> {
        Self::with_params(
            correlation_id,
            cp::ACCRDBRM,
            &[
                (cp::SVRCOD, &severity.to_be_bytes()[..]),
                (cp::PRDID, product_id.as_bytes()),
            ],
        )
    }

    /// QRYDTA with one SQLDTARD per row.
    pub fn rows(correlation_id: u16, rows: &[Vec<Value>]) -> Result<BytesMut, EncodeError> {
        let mut payload = BytesMut::new();
        let mut row_buf = BytesMut::new();
        for row in rows {
            row_buf.clear();
            for value in row {
                value.encode(&mut row_buf)?;
            }
            put_parameter(&mut payload, cp::SQLDTARD, &row_buf)?;
        }
        build_frame(FrameType::Reply, correlation_id, cp::QRYDTA, &payload)
    }

    pub fn sql_card(correlation_id: u16, card: &SqlCard) -> Result<BytesMut, EncodeError> {
        let msg = card.message.as_bytes();
        let msg_len = u16::try_from(msg.len()).map_err(|_| EncodeError::TooLarge {
            what: "SQLCARD message",
            len: msg.len(),
        })?;
        let mut state = [b' '; 5];
        for (dst, src) in state.iter_mut().zip(card.sqlstate.bytes()) {
            *dst = src;
        }
        let mut payload = BytesMut::with_capacity(19 + msg.len());
        payload.put_i32(card.sqlcode);
        payload.put_slice(&state);
        payload.put_i64(card.rows_affected);
        payload.put_u16(msg_len);
        payload.put_slice(msg);
        build_frame(FrameType::Reply, correlation_id, cp::SQLCARD, &payload)
    }

    /// SQLDARD describing a prepared statement.
    pub fn prepared(correlation_id: u16, handle: u16) -> Result<BytesMut, EncodeError> {
        Self::with_params(
            correlation_id,
            cp::SQLDARD,
            &[(cp::PKGSN, &handle.to_be_bytes()[..])],
        )
    }
}
