//! Request builders.
//!
//! Each builder collects parameters, wraps them in one DDM object and
//! prepends the frame header computed over the whole message. No I/O.

use super::code_points::{self as cp, SecurityMechanism};
use super::error::EncodeError;
use super::frame::{FrameType, build_frame, put_parameter};
use super::value::Value;
use bytes::{BufMut, BytesMut};

/// Product id sent in ACCRDB.
pub const PRODUCT_ID: &str = "DRS01000";

/// Manager levels advertised in ACCSEC.
pub const DEFAULT_MANAGER_LEVELS: [(u16, u16); 5] = [
    (cp::AGENT, 7),
    (cp::SQLAM, 7),
    (cp::RDB, 7),
    (cp::SECMGR, 7),
    (cp::CMNTCPIP, 5),
];

/// Credential material carried by SECCHK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityToken<'a> {
    /// Plaintext password, sent NUL-terminated in PASSWORD.
    Password(&'a str),
    /// Opaque bytes in SECTKN: an encrypted password, Kerberos ticket or
    /// plug-in token.
    Token(&'a [u8]),
}

struct MessageBuilder {
    code_point: u16,
    payload: BytesMut,
}

impl MessageBuilder {
    fn new(code_point: u16) -> Self {
        Self {
            code_point,
            payload: BytesMut::with_capacity(128),
        }
    }

    fn param(mut self, code_point: u16, data: &[u8]) -> Result<Self, EncodeError> {
        put_parameter(&mut self.payload, code_point, data)?;
        Ok(self)
    }

    fn u16_param(self, code_point: u16, value: u16) -> Result<Self, EncodeError> {
        self.param(code_point, &value.to_be_bytes())
    }

    fn cstring_param(
        self,
        code_point: u16,
        what: &'static str,
        value: &str,
    ) -> Result<Self, EncodeError> {
        if value.as_bytes().contains(&0) {
            return Err(EncodeError::NullByte(what));
        }
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.param(code_point, &data)
    }

    fn value_params(mut self, values: &[Value]) -> Result<Self, EncodeError> {
        let mut scratch = BytesMut::new();
        for value in values {
            scratch.clear();
            value.encode(&mut scratch)?;
            put_parameter(&mut self.payload, cp::SQLDTA, &scratch)?;
        }
        Ok(self)
    }

    fn finish(self, correlation_id: u16) -> Result<BytesMut, EncodeError> {
        build_frame(
            FrameType::Request,
            correlation_id,
            self.code_point,
            &self.payload,
        )
    }
}

/// Stateless request encoder.
pub struct DrdaEncoder;

impl DrdaEncoder {
    /// EXCSAT: client name, requested security mechanism, database name.
    ///
    /// The object code point always lands at bytes 8..10.
    pub fn exchange_server_attributes(
        correlation_id: u16,
        client_name: &str,
        mechanism: SecurityMechanism,
        database: &str,
    ) -> Result<BytesMut, EncodeError> {
        MessageBuilder::new(cp::EXCSAT)
            .param(cp::EXTNAM, client_name.as_bytes())?
            .u16_param(cp::SECMEC, mechanism.code())?
            .param(cp::RDBNAM, database.as_bytes())?
            .finish(correlation_id)
    }

    /// ACCSEC: mechanism, database and the manager-level list.
    pub fn access_security(
        correlation_id: u16,
        mechanism: SecurityMechanism,
        database: &str,
        manager_levels: &[(u16, u16)],
    ) -> Result<BytesMut, EncodeError> {
        let mut levels = BytesMut::with_capacity(manager_levels.len() * 4);
        for &(manager, level) in manager_levels {
            levels.put_u16(manager);
            levels.put_u16(level);
        }
        MessageBuilder::new(cp::ACCSEC)
            .u16_param(cp::SECMEC, mechanism.code())?
            .param(cp::RDBNAM, database.as_bytes())?
            .param(cp::MGRLVLLS, &levels)?
            .finish(correlation_id)
    }

    /// SECCHK: mechanism, NUL-terminated user id, then the credential.
    pub fn security_check(
        correlation_id: u16,
        mechanism: SecurityMechanism,
        user: &str,
        token: SecurityToken<'_>,
    ) -> Result<BytesMut, EncodeError> {
        let msg = MessageBuilder::new(cp::SECCHK)
            .u16_param(cp::SECMEC, mechanism.code())?
            .cstring_param(cp::USRID, "user id", user)?;
        let msg = match token {
            SecurityToken::Password(password) => {
                msg.cstring_param(cp::PASSWORD, "password", password)?
            }
            SecurityToken::Token(bytes) => msg.param(cp::SECTKN, bytes)?,
        };
        msg.finish(correlation_id)
    }

    /// ACCRDB: database name, product id, then any extra parameters.
    pub fn access_database(
        correlation_id: u16,
        database: &str,
        extra: &[(u16, &[u8])],
    ) -> Result<BytesMut, EncodeError> {
        let mut msg = MessageBuilder::new(cp::ACCRDB)
            .param(cp::RDBNAM, database.as_bytes())?
            .param(cp::PRDID, PRODUCT_ID.as_bytes())?;
        for &(code_point, data) in extra {
            msg = msg.param(code_point, data)?;
        }
        msg.finish(correlation_id)
    }

    /// EXCSQLIMM: SQL text plus one SQLDTA per bound value.
    pub fn execute_immediate(
        correlation_id: u16,
        sql: &str,
        params: &[Value],
    ) -> Result<BytesMut, EncodeError> {
        MessageBuilder::new(cp::EXCSQLIMM)
            .param(cp::SQLSTT, sql.as_bytes())?
            .value_params(params)?
            .finish(correlation_id)
    }

    /// PRPSQLSTT
    pub fn prepare(correlation_id: u16, sql: &str) -> Result<BytesMut, EncodeError> {
        MessageBuilder::new(cp::PRPSQLSTT)
            .param(cp::SQLSTT, sql.as_bytes())?
            .finish(correlation_id)
    }

    /// EXCSQLSTT: statement handle plus bound values.
    pub fn execute_prepared(
        correlation_id: u16,
        handle: u16,
        params: &[Value],
    ) -> Result<BytesMut, EncodeError> {
        MessageBuilder::new(cp::EXCSQLSTT)
            .u16_param(cp::PKGSN, handle)?
            .value_params(params)?
            .finish(correlation_id)
    }

    /// CLSQRY: release the server-side statement.
    pub fn close_statement(correlation_id: u16, handle: u16) -> Result<BytesMut, EncodeError> {
        MessageBuilder::new(cp::CLSQRY)
            .u16_param(cp::PKGSN, handle)?
            .finish(correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{DSS_FLAGS, Frame, ParameterList};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_excsat_raw_layout() {
        let buf = DrdaEncoder::exchange_server_attributes(
            1,
            "app",
            SecurityMechanism::UserIdPassword,
            "SAMPLE",
        )
        .unwrap();
        let total = buf.len() as u16;
        assert_eq!(&buf[0..2], &total.to_be_bytes());
        assert_eq!(buf[2], DSS_FLAGS);
        assert_eq!(buf[3], 0x01);
        assert_eq!(&buf[4..6], &[0x00, 0x01]);
        assert_eq!(&buf[6..8], &(total - 6).to_be_bytes());
        assert_eq!(&buf[8..10], &[0x10, 0x41]);
        // first parameter: EXTNAM "app"
        assert_eq!(&buf[10..17], &[0x00, 0x07, 0x11, 0x5E, b'a', b'p', b'p']);
    }

    #[test]
    fn test_excsat_parses_back() {
        let buf = DrdaEncoder::exchange_server_attributes(
            9,
            "drda-rs",
            SecurityMechanism::EncryptedPassword,
            "SAMPLE",
        )
        .unwrap();
        let frame = Frame::parse(buf.freeze()).unwrap();
        assert_eq!(frame.code_point, cp::EXCSAT);
        assert_eq!(frame.correlation_id(), 9);

        let params = frame.parameters().unwrap();
        assert_eq!(params.find_string(cp::RDBNAM).unwrap().as_deref(), Some("SAMPLE"));
        assert_eq!(params.find_string(cp::EXTNAM).unwrap().as_deref(), Some("drda-rs"));
        assert_eq!(
            params.find_u16(cp::SECMEC).unwrap(),
            Some(SecurityMechanism::EncryptedPassword.code())
        );
    }

    #[test]
    fn test_secchk_password_is_nul_terminated() {
        let buf = DrdaEncoder::security_check(
            3,
            SecurityMechanism::UserIdPassword,
            "db2inst1",
            SecurityToken::Password("pw"),
        )
        .unwrap();
        let frame = Frame::parse(buf.freeze()).unwrap();
        let params = frame.parameters().unwrap();
        assert_eq!(&params.require(cp::USRID).unwrap()[..], b"db2inst1\0");
        assert_eq!(&params.require(cp::PASSWORD).unwrap()[..], b"pw\0");
        assert!(params.find(cp::SECTKN).is_none());
    }

    #[test]
    fn test_secchk_token_replaces_password() {
        let buf = DrdaEncoder::security_check(
            3,
            SecurityMechanism::EncryptedPassword,
            "u",
            SecurityToken::Token(&[0xAA, 0xBB]),
        )
        .unwrap();
        let params = Frame::parse(buf.freeze()).unwrap().parameters().unwrap();
        assert_eq!(&params.require(cp::SECTKN).unwrap()[..], &[0xAA, 0xBB]);
        assert_eq!(params.find_u16(cp::SECMEC).unwrap(), Some(0x0007));
        assert!(params.find(cp::PASSWORD).is_none());
    }

    #[test]
    fn test_nul_in_password_rejected() {
        let err = DrdaEncoder::security_check(
            1,
            SecurityMechanism::UserIdPassword,
            "u",
            SecurityToken::Password("a\0b"),
        );
        assert_eq!(err, Err(EncodeError::NullByte("password")));
    }

    #[test]
    fn test_accsec_manager_levels() {
        let buf = DrdaEncoder::access_security(
            2,
            SecurityMechanism::UserIdPassword,
            "DB",
            &[(cp::AGENT, 7), (cp::SQLAM, 6)],
        )
        .unwrap();
        let params = Frame::parse(buf.freeze()).unwrap().parameters().unwrap();
        assert_eq!(
            &params.require(cp::MGRLVLLS).unwrap()[..],
            &[0x14, 0x03, 0x00, 0x07, 0x24, 0x07, 0x00, 0x06]
        );
    }

    #[test]
    fn test_execute_binds_values_in_order() {
        let buf = DrdaEncoder::execute_immediate(
            9,
            "INSERT INTO t VALUES (?, ?)",
            &[Value::from(1i64), Value::Null],
        )
        .unwrap();
        let frame = Frame::parse(buf.freeze()).unwrap();
        assert_eq!(frame.code_point, cp::EXCSQLIMM);
        let params = frame.parameters().unwrap();
        let values: Vec<_> = params
            .iter()
            .filter(|p| p.code_point == cp::SQLDTA)
            .map(|p| Value::decode(&p.data).unwrap().0)
            .collect();
        assert_eq!(values, vec![Value::BigInt(1), Value::Null]);
    }

    #[test]
    fn test_close_statement_carries_handle() {
        let buf = DrdaEncoder::close_statement(4, 0x0102).unwrap();
        assert_eq!(&buf[8..10], &[0x20, 0x04]);
        assert_eq!(&buf[10..16], &[0x00, 0x06, 0x21, 0x0C, 0x01, 0x02]);
    }
}
