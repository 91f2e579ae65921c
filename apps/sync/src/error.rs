//! Sync errors.

use thiserror::Error;

use crate::client::ClientError;
use crate::store::StoreError;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote action {action} failed: {message}")]
    Remote { action: String, message: String },

    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync already in progress")]
    AlreadyInProgress,

    #[error("Sync cancelled by user")]
    Cancelled,
}

impl From<ClientError> for SyncError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Network(_) | ClientError::Backend { .. } => Self::Transport(e.to_string()),
            ClientError::Rejected { action, message } => Self::Remote { action, message },
            ClientError::Decode(message) | ClientError::Shape(message) => Self::Shape(message),
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
