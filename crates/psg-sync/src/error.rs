//! Error types for the sync layer.

use psg_core::ValidationError;
use psg_store::StoreError;
use thiserror::Error;

/// Reasons an inbound message or request body is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Message carries no data")]
    MissingData,

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] ValidationError),
}

/// Errors surfaced by the sync service.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// True when the caller sent something unacceptable, as opposed to a
    /// server-side failure.
    pub fn is_rejection(&self) -> bool {
        match self {
            SyncError::Protocol(_) => true,
            SyncError::Store(e) => e.is_validation(),
            SyncError::Internal(_) => false,
        }
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        SyncError::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
