//! Settings file loading.
//!
//! ```toml
//! [connection]
//! host = "db.example.com"
//! port = 50000
//! database = "SAMPLE"
//! query_timeout_millis = 5000
//!
//! [connection.auth]
//! type = "password"
//! user = "db2inst1"
//! password = "secret"
//! encrypt = true
//!
//! [connection.tls]
//! enabled = true
//! cert_path = "/etc/drda/ca.pem"
//!
//! [pool]
//! min_pool_size = 2
//! max_pool_size = 10
//! ```

use crate::error::{Error, Result};
use drda_client::{ConnectionConfig, PoolConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "DRDA_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub pool: PoolConfig,
}

impl Settings {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load from `explicit`, else `$DRDA_CONFIG`, else
    /// `<config dir>/drda/config.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let path = resolve(explicit, env, default_path())?;
        tracing::debug!(path = %path.display(), "loading settings");
        Self::from_file(&path)
    }

    /// Validate both sections before anything touches the network.
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        self.pool.validate()?;
        Ok(())
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("drda").join("config.toml"))
}

/// First existing candidate, or the explicit path even if missing so the
/// read error names it.
fn resolve(
    explicit: Option<&Path>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let candidates: Vec<PathBuf> = env.into_iter().chain(default).collect();
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(Error::ConfigNotFound(candidates))
}
