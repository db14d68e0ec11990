//! Async DRDA client.
//!
//! **Layers:** pure wire codec (`protocol`), async driver (`driver`),
//! authentication strategies (`auth`), serde configuration (`config`).
//!
//! ```ignore
//! let config = ConnectionConfig::new("db.example.com", 50000, "SAMPLE")
//!     .password("db2inst1", "secret");
//! let mut conn = Connection::from_config(config)?;
//! conn.open().await?;
//! let result = conn.query("SELECT id FROM users WHERE name = ?", &["ada".into()]).await?;
//! conn.close().await?;
//! ```

pub mod auth;
pub mod config;
pub mod driver;
pub mod protocol;

pub use auth::{AuthStrategy, Credentials, JwtAuth, KerberosAuth, LdapAuth, PasswordAuth, Secret};
pub use config::{AuthConfig, ConnectionConfig, IsolationLevel, PoolConfig, TlsOptions};
pub use driver::{
    Connection, ConnectionManager, ConnectionState, DrdaError, DrdaResult, HealthReport,
    PoolError, PoolEvent, PoolStats, PooledConnection, PreparedStatement, QueryResult,
    ResourcePool, TransactionManager, TransactionTarget,
};
pub use protocol::{Row, SecurityMechanism, Value};
