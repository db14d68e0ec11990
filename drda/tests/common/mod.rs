//! In-process DRDA server for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use drda_client::driver::{Connector, DrdaStream};
use drda_client::protocol::code_points as cp;
use drda_client::protocol::{Frame, ParameterList, ReplyBuilder, SqlCard};
use drda_client::{ConnectionConfig, DrdaResult, SecurityMechanism, Value};
use drda_core::RsaKeyPair;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

pub const PASSWORD: &str = "secret";
pub const USER: &str = "db2inst1";

/// How the mock server answers.
#[derive(Clone)]
pub struct MockServer {
    /// Mechanism announced in ACCSECRD.
    pub mechanism: SecurityMechanism,
    pub key: Option<RsaKeyPair>,
    pub password: String,
    pub rows: Vec<Vec<Value>>,
    /// Reply to this request code point with a bumped correlation id.
    pub skew_correlation_on: Option<u16>,
    /// Sleep before answering SQL containing "SLOW".
    pub slow_delay: Duration,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Default for MockServer {
    fn default() -> Self {
        Self {
            mechanism: SecurityMechanism::UserIdPassword,
            key: None,
            password: PASSWORD.to_string(),
            rows: vec![
                vec![Value::from(1i64), Value::from("ada")],
                vec![Value::from(2i64), Value::Null],
            ],
            skew_correlation_on: None,
            slow_delay: Duration::from_secs(60),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockServer {
    /// Server that insists on encrypted passwords.
    pub fn encrypted() -> Self {
        Self {
            mechanism: SecurityMechanism::EncryptedPassword,
            key: Some(RsaKeyPair::generate(512).unwrap()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Start serving one client; returns the client half.
    pub fn start(&self) -> DuplexStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let this = self.clone();
        tokio::spawn(async move { this.serve(server).await });
        client
    }

    async fn serve(self, mut io: DuplexStream) {
        let mut next_handle = 1u16;
        while let Some(frame) = read_frame(&mut io).await {
            let corr = frame.correlation_id();
            let params = frame.parameters().unwrap();
            let reply = match frame.code_point {
                cp::EXCSAT => {
                    self.record("EXCSAT");
                    ReplyBuilder::server_attributes(corr, "MOCKSRV", "mock-db")
                }
                cp::ACCSEC => {
                    self.record("ACCSEC");
                    let der = self.key.as_ref().map(|k| k.public_der());
                    ReplyBuilder::access_security(corr, self.mechanism, der.as_deref())
                }
                cp::SECCHK => {
                    let user = params.find_string(cp::USRID).unwrap().unwrap_or_default();
                    let password = match (params.find_string(cp::PASSWORD).unwrap(), params.find(cp::SECTKN)) {
                        (Some(plain), _) => {
                            self.record("SECCHK PASSWORD");
                            plain
                        }
                        (None, Some(token)) => {
                            self.record("SECCHK SECTKN");
                            let key = self.key.as_ref().unwrap();
                            String::from_utf8(key.decrypt_bytes(token).unwrap()).unwrap_or_default()
                        }
                        (None, None) => String::new(),
                    };
                    let code = if user == USER && password == self.password { 0 } else { 0x0F };
                    ReplyBuilder::security_check(corr, code)
                }
                cp::ACCRDB => {
                    self.record("ACCRDB");
                    ReplyBuilder::access_database(corr, 0, "MOCK0100")
                }
                cp::EXCSQLIMM => {
                    let sql = params.find_string(cp::SQLSTT).unwrap().unwrap_or_default();
                    self.record(&sql);
                    if sql.contains("SLOW") {
                        tokio::time::sleep(self.slow_delay).await;
                    }
                    if sql.contains("BOGUS") {
                        ReplyBuilder::sql_card(corr, &SqlCard::error(-204, "42704", "BOGUS is an undefined name"))
                    } else if sql.starts_with("SELECT") {
                        ReplyBuilder::rows(corr, &self.rows)
                    } else {
                        ReplyBuilder::sql_card(corr, &SqlCard::ok(1))
                    }
                }
                cp::PRPSQLSTT => {
                    let sql = params.find_string(cp::SQLSTT).unwrap().unwrap_or_default();
                    self.record(&format!("PREPARE {sql}"));
                    let handle = next_handle;
                    next_handle += 1;
                    ReplyBuilder::prepared(corr, handle)
                }
                cp::EXCSQLSTT => {
                    let handle = params.find_u16(cp::PKGSN).unwrap().unwrap_or_default();
                    self.record(&format!("EXECUTE {handle}"));
                    ReplyBuilder::rows(corr, &self.rows)
                }
                cp::CLSQRY => {
                    let handle = params.find_u16(cp::PKGSN).unwrap().unwrap_or_default();
                    self.record(&format!("CLOSE {handle}"));
                    ReplyBuilder::sql_card(corr, &SqlCard::ok(0))
                }
                other => panic!("mock server got unexpected code point 0x{other:04X}"),
            };
            let mut reply = reply.unwrap();
            if self.skew_correlation_on == Some(frame.code_point) {
                let skewed = corr.wrapping_add(1).to_be_bytes();
                reply[4..6].copy_from_slice(&skewed);
            }
            if io.write_all(&reply).await.is_err() {
                break;
            }
        }
    }

    fn record(&self, entry: &str) {
        self.log.lock().unwrap().push(entry.to_string());
    }
}

async fn read_frame(io: &mut DuplexStream) -> Option<Frame> {
    let mut header = [0u8; 6];
    io.read_exact(&mut header).await.ok()?;
    let len = u16::from_be_bytes([header[0], header[1]]) as usize;
    let mut buf = BytesMut::with_capacity(len);
    buf.extend_from_slice(&header);
    buf.resize(len, 0);
    io.read_exact(&mut buf[6..]).await.ok()?;
    Some(Frame::parse(Bytes::from(buf)).unwrap())
}

/// Hands each new pooled connection its own mock server session.
pub struct MockConnector(pub MockServer);

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> DrdaResult<DrdaStream> {
        Ok(DrdaStream::from(self.0.start()))
    }
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new("mock", 50000, "SAMPLE").password(USER, PASSWORD)
}

pub fn config_with_password(password: &str) -> ConnectionConfig {
    ConnectionConfig::new("mock", 50000, "SAMPLE").password(USER, password)
}
