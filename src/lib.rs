//! # drda
//!
//! Command-line front end and application wiring for the DRDA client.
//! The wire protocol and pool live in `drda-client`, big integers and
//! RSA keys in `drda-core`.
//!
//! ```rust,ignore
//! use drda::prelude::*;
//!
//! let ctx = DrdaContext::new(Settings::load(None)?)?;
//! ctx.connect().await?;
//! let mut conn = ctx.acquire().await?;
//! let result = conn.query("SELECT id FROM users", &[]).await?;
//! ```

pub mod config;
pub mod context;
pub mod error;

pub use drda_client;
pub use drda_core;

pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::context::DrdaContext;
    pub use crate::error::{Error, Result};
    pub use drda_client::{
        Connection, ConnectionConfig, ConnectionState, DrdaError, IsolationLevel, PoolConfig,
        Row, TransactionManager, Value,
    };
    pub use drda_core::{BigInteger, RsaKeyPair};
}
