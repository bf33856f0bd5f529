//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists where one was required
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Record failed integrity checks on load
    #[error("invalid checkpoint: {0}")]
    Invalid(String),
}

impl From<sqlx::Error> for CheckpointError {
    fn from(err: sqlx::Error) -> Self {
        CheckpointError::Storage(err.to_string())
    }
}

impl From<::redis::RedisError> for CheckpointError {
    fn from(err: ::redis::RedisError) -> Self {
        CheckpointError::Storage(err.to_string())
    }
}
