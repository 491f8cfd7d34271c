//! Error taxonomy shared by every REM layer.

use rem_models::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemError {
    /// Store unreachable or not connected. Never retried internally.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Malformed query parameters or unsupported profiles.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store-side failure while reading or writing records.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RemError {
    pub fn validation(message: impl Into<String>) -> Self {
        RemError::Validation(message.into())
    }

    /// Whether the failure came from the store rather than the caller.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, RemError::Connectivity(_) | RemError::Storage(_))
    }
}

impl From<ModelError> for RemError {
    fn from(err: ModelError) -> Self {
        RemError::Validation(err.to_string())
    }
}

/// Result type alias for REM operations
pub type Result<T> = std::result::Result<T, RemError>;
