//! DRDA Connection
//!
//! One socket, one conversation. `open()` drives
//! EXCSAT → ACCSEC → SECCHK → ACCRDB and walks the state machine:
//!
//! ```text
//! DISCONNECTED → INITIALIZING → CONNECTING → AUTHENTICATING → CONNECTED
//! ```
//!
//! Any I/O or protocol failure lands in ERROR; a rejected security check
//! lands in AUTH_FAILED.

use super::prepared::PreparedStatement;
use super::state::{ConnectionState, StateMachine};
use super::stream::DrdaStream;
use super::{DrdaError, DrdaResult};
use crate::auth::{AuthStrategy, Credentials, Secret};
use crate::config::ConnectionConfig;
use crate::protocol::code_points as cp;
use crate::protocol::{
    DEFAULT_MANAGER_LEVELS, DrdaEncoder, HandshakeReply, Reply, SecurityMechanism, SecurityToken,
};
use bytes::BytesMut;
use drda_core::RsaKeyPair;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// Initial read buffer capacity.
pub(crate) const BUFFER_CAPACITY: usize = 8192;

/// Attributes the server reported in EXCSATRD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerAttributes {
    pub server_name: Option<String>,
    pub external_name: Option<String>,
    /// From ACCRDBRM.
    pub product_id: Option<String>,
}

/// A raw DRDA connection.
pub struct Connection {
    pub(crate) stream: Option<DrdaStream>,
    pub(crate) buffer: BytesMut,
    pub(crate) state: StateMachine,
    pub(crate) next_correlation: u16,
    pub(crate) config: Arc<ConnectionConfig>,
    pub(crate) auth: Arc<dyn AuthStrategy>,
    pub(crate) security_mechanism: Option<SecurityMechanism>,
    pub(crate) server: ServerAttributes,
    pub(crate) stmt_cache: LruCache<String, PreparedStatement>,
    pub(crate) created_at: Instant,
}

impl Connection {
    /// A connection in DISCONNECTED; nothing is sent until `open()`.
    pub fn new(config: Arc<ConnectionConfig>, auth: Arc<dyn AuthStrategy>) -> Self {
        let cache_size = NonZeroUsize::new(config.statement_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            stream: None,
            buffer: BytesMut::with_capacity(BUFFER_CAPACITY),
            state: StateMachine::new("connection"),
            next_correlation: 1,
            config,
            auth,
            security_mechanism: None,
            server: ServerAttributes::default(),
            stmt_cache: LruCache::new(cache_size),
            created_at: Instant::now(),
        }
    }

    /// Build from configuration, using the auth block it names.
    pub fn from_config(config: ConnectionConfig) -> DrdaResult<Self> {
        config.validate()?;
        let auth = match &config.auth {
            Some(auth) => crate::auth::strategy_for(auth),
            None => return Err(DrdaError::Config("missing auth".to_string())),
        };
        Ok(Self::new(Arc::new(config), auth))
    }

    /// Connect over TCP (or TLS when configured) and run the handshake.
    pub async fn open(&mut self) -> DrdaResult<()> {
        let credentials = self.initialize().await?;
        self.require_transition(ConnectionState::Connecting)?;

        let config = Arc::clone(&self.config);
        let timeout = config.connect_timeout_duration();
        let (host, port) = (config.host.as_str(), config.port);
        let connect = async {
            if config.tls.enabled {
                DrdaStream::connect_tls(host, port, &config.tls).await
            } else {
                DrdaStream::connect_tcp(host, port).await
            }
        };
        let stream = match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                return Err(self.fail(DrdaError::Connection(format!(
                    "connect to {}:{} timed out after {:?}",
                    host, port, timeout
                ))));
            }
        };
        tracing::debug!(host = %host, port, tls = stream.is_tls(), "socket established");
        self.stream = Some(stream);
        self.handshake(credentials).await
    }

    /// Run the handshake over an already-connected stream.
    pub async fn open_with_stream(&mut self, stream: impl Into<DrdaStream>) -> DrdaResult<()> {
        let credentials = self.initialize().await?;
        self.require_transition(ConnectionState::Connecting)?;
        self.stream = Some(stream.into());
        self.handshake(credentials).await
    }

    async fn initialize(&mut self) -> DrdaResult<Credentials> {
        if self.state.state() != ConnectionState::Disconnected {
            return Err(DrdaError::Connection(format!(
                "cannot open a connection in state {}",
                self.state.state()
            )));
        }
        self.require_transition(ConnectionState::Initializing)?;
        match self.auth.authenticate().await {
            Ok(credentials) => Ok(credentials),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn handshake(&mut self, credentials: Credentials) -> DrdaResult<()> {
        match self.run_handshake(credentials).await {
            Ok(()) => Ok(()),
            Err(e @ DrdaError::AuthFailed(_)) => {
                self.state.transition(ConnectionState::AuthFailed);
                self.stream = None;
                Err(e)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run_handshake(&mut self, credentials: Credentials) -> DrdaResult<()> {
        let database = self.config.database.clone();
        let requested = credentials.mechanism;

        // EXCSAT
        let client_name = self.config.client_name.clone();
        let frame = self
            .request(|corr| {
                DrdaEncoder::exchange_server_attributes(corr, &client_name, requested, &database)
            })
            .await?;
        let attrs = Reply::expect_handshake(&frame, cp::EXCSATRD, "EXCSATRD")?;
        self.server.server_name = attrs.string(cp::SRVNAM)?;
        self.server.external_name = attrs.string(cp::EXTNAM)?;

        self.require_transition(ConnectionState::Authenticating)?;

        // ACCSEC
        let frame = self
            .request(|corr| {
                DrdaEncoder::access_security(corr, requested, &database, &DEFAULT_MANAGER_LEVELS)
            })
            .await?;
        let accsec = Reply::expect_handshake(&frame, cp::ACCSECRD, "ACCSECRD")?;
        if !accsec.success {
            return Err(DrdaError::AuthFailed(accsec.u16(cp::SECCHKCD)?.unwrap_or(0)));
        }
        let mechanism = negotiate(requested, &accsec)?;
        tracing::info!(
            mechanism = %mechanism,
            requested = %requested,
            encrypted = mechanism == SecurityMechanism::EncryptedPassword,
            "security mechanism negotiated"
        );
        self.security_mechanism = Some(mechanism);

        // SECCHK
        let token = security_token(mechanism, &credentials, &accsec)?;
        let user = credentials.user.clone();
        let frame = self
            .request(|corr| {
                let token = match &token {
                    WireToken::Password(p) => SecurityToken::Password(p),
                    WireToken::Bytes(b) => SecurityToken::Token(b),
                };
                DrdaEncoder::security_check(corr, mechanism, &user, token)
            })
            .await?;
        let secchk = Reply::expect_handshake(&frame, cp::SECCHKRM, "SECCHKRM")?;
        if !secchk.success {
            let code = secchk.u16(cp::SECCHKCD)?.unwrap_or(0);
            tracing::warn!(user = %user, code, "security check rejected");
            return Err(DrdaError::AuthFailed(code));
        }

        // ACCRDB
        let frame = self
            .request(|corr| DrdaEncoder::access_database(corr, &database, &[]))
            .await?;
        let accrdb = Reply::expect_handshake(&frame, cp::ACCRDBRM, "ACCRDBRM")?;
        if !accrdb.success {
            return Err(DrdaError::Connection(format!(
                "access to database {} refused (SVRCOD {})",
                database,
                accrdb.u16(cp::SVRCOD)?.unwrap_or(0)
            )));
        }
        self.server.product_id = accrdb.string(cp::PRDID)?;

        self.require_transition(ConnectionState::Connected)?;
        tracing::info!(
            database = %database,
            server = ?self.server.server_name,
            "connection established"
        );
        Ok(())
    }

    /// Close the socket: CONNECTED → DISCONNECTING → DISCONNECTED, or
    /// ERROR → DISCONNECTED.
    pub async fn close(&mut self) -> DrdaResult<()> {
        match self.state.state() {
            ConnectionState::Connected => {
                self.state.transition(ConnectionState::Disconnecting);
            }
            ConnectionState::Error | ConnectionState::Disconnecting => {}
            _ => {
                self.stream = None;
                return Ok(());
            }
        }
        self.stmt_cache.clear();
        let result = match self.stream.take() {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        };
        self.state.transition(ConnectionState::Disconnected);
        result.map_err(DrdaError::from)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    /// CONNECTED with a live stream.
    pub fn is_usable(&self) -> bool {
        self.state.state() == ConnectionState::Connected && self.stream.is_some()
    }

    /// The mechanism in effect after ACCSEC.
    pub fn security_mechanism(&self) -> Option<SecurityMechanism> {
        self.security_mechanism
    }

    /// Whether the password travelled RSA-encrypted.
    pub fn is_password_encrypted(&self) -> bool {
        self.security_mechanism == Some(SecurityMechanism::EncryptedPassword)
    }

    pub fn server_attributes(&self) -> &ServerAttributes {
        &self.server
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub(crate) fn require_transition(&mut self, next: ConnectionState) -> DrdaResult<()> {
        if self.state.transition(next) {
            Ok(())
        } else {
            Err(DrdaError::Connection(format!(
                "invalid transition {} -> {}",
                self.state.state(),
                next
            )))
        }
    }

    /// Land in ERROR and hand the error back.
    pub(crate) fn fail(&mut self, err: DrdaError) -> DrdaError {
        tracing::error!(error = %err, state = %self.state.state(), "connection failed");
        self.state.fail();
        err
    }
}

/// Pick the mechanism to use from the server's ACCSECRD.
fn negotiate(
    requested: SecurityMechanism,
    reply: &HandshakeReply,
) -> DrdaResult<SecurityMechanism> {
    let offered = match reply.u16(cp::SECMEC)? {
        None => return Ok(requested),
        Some(code) => SecurityMechanism::from_code(code).ok_or_else(|| {
            DrdaError::Auth(format!("server offered unsupported mechanism 0x{:04X}", code))
        })?,
    };
    use SecurityMechanism::*;
    match (requested, offered) {
        (a, b) if a == b => Ok(a),
        // Server insists on encryption; a password can be encrypted.
        (UserIdPassword, EncryptedPassword) => Ok(EncryptedPassword),
        (EncryptedPassword, UserIdPassword) => {
            tracing::warn!("server offered plaintext password; refusing downgrade");
            Err(DrdaError::AuthFailed(0x0001))
        }
        (requested, offered) => Err(DrdaError::Auth(format!(
            "server offered {} but client requested {}",
            offered, requested
        ))),
    }
}

enum WireToken {
    Password(String),
    Bytes(Vec<u8>),
}

/// The SECCHK credential for the negotiated mechanism.
fn security_token(
    mechanism: SecurityMechanism,
    credentials: &Credentials,
    accsec: &HandshakeReply,
) -> DrdaResult<WireToken> {
    match (mechanism, &credentials.secret) {
        (SecurityMechanism::UserIdPassword, Secret::Password(p)) => {
            Ok(WireToken::Password(p.clone()))
        }
        (SecurityMechanism::EncryptedPassword, Secret::Password(p)) => {
            let der = accsec.param(cp::SECTKN).ok_or_else(|| {
                DrdaError::Auth("server requested encryption without a public key".to_string())
            })?;
            let key = RsaKeyPair::from_der(der)?;
            Ok(WireToken::Bytes(key.encrypt_bytes(p.as_bytes())?))
        }
        (SecurityMechanism::Kerberos | SecurityMechanism::Plugin, Secret::Token(t)) => {
            Ok(WireToken::Bytes(t.clone()))
        }
        (mechanism, _) => Err(DrdaError::Auth(format!(
            "credentials do not fit mechanism {}",
            mechanism
        ))),
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .field("state", &self.state.state())
            .field("security_mechanism", &self.security_mechanism)
            .finish()
    }
}
