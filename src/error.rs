//! Error types for the application crate.

use drda_client::DrdaError;
use drda_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No config file at any of the searched locations.
    #[error("No configuration file found (searched: {})", display_paths(.0))]
    ConfigNotFound(Vec<PathBuf>),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Drda(#[from] DrdaError),

    #[error("Key material error: {0}")]
    Crypto(#[from] CoreError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
