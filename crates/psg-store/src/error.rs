//! Error types for the state store.

use psg_core::ValidationError;
use psg_snapshot::SnapshotError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by state store writes.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl StoreError {
    /// True when the record itself was rejected, before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
