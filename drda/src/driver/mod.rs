//! DRDA Driver Module (Layer 3: Async I/O)
//!
//! Connection methods are split across modules:
//! - `connection.rs` - Core struct, open/close and the handshake
//! - `io.rs` - framed send/recv with correlation checking
//! - `query.rs` - query, execute_command
//! - `prepared.rs` - prepare, execute, close, statement cache
//! - `state.rs` - connection state machine
//! - `pool.rs` - generic resource pool
//! - `manager.rs` - pooled connections with health reporting
//! - `transaction.rs` - begin/commit/rollback, retry and timeout helpers

mod connection;
mod io;
pub mod manager;
pub mod pool;
mod prepared;
mod query;
pub mod state;
mod stream;
pub mod transaction;

pub use connection::{Connection, ServerAttributes};
pub use manager::{ConnectionFactory, ConnectionManager, Connector, HealthReport, PooledConnection};
pub use pool::{Factory, PoolError, PoolEvent, PoolStats, Pooled, ResourcePool, Validator};
pub use prepared::PreparedStatement;
pub use query::QueryResult;
pub use state::{ConnectionState, StateMachine};
pub use stream::DrdaStream;
pub use transaction::{TransactionManager, TransactionTarget};

use crate::protocol::{DecodeError, EncodeError};
use drda_core::CoreError;
use std::time::Duration;
use thiserror::Error;

/// Error type for DRDA driver operations.
#[derive(Debug, Error)]
pub enum DrdaError {
    /// Missing or inconsistent settings, raised before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Auth error: {0}")]
    Auth(String),

    /// The server rejected the security check.
    #[error("Authentication failed: security check code 0x{0:04X}")]
    AuthFailed(u16),

    /// Negative SQLCODE from the server.
    #[error("Query error: SQLCODE={sqlcode}, SQLSTATE={sqlstate}: {message}")]
    Query {
        sqlcode: i32,
        sqlstate: String,
        message: String,
    },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation requires state CONNECTED, connection is {0}")]
    NotConnected(ConnectionState),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Key error: {0}")]
    Crypto(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DrdaError {
    /// Errors that leave the connection unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DrdaError::Connection(_)
                | DrdaError::Protocol(_)
                | DrdaError::Io(_)
                | DrdaError::Timeout(_)
                | DrdaError::AuthFailed(_)
        )
    }
}

/// Result type for DRDA operations.
pub type DrdaResult<T> = Result<T, DrdaError>;
