//! Error type for the fallible edges of the crate.
//!
//! The analysis core never fails; only configuration loading, file
//! collection and report writing produce errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised outside the analysis core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;
