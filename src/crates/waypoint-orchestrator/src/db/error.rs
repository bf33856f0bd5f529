//! Database error types

use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Underlying sqlx failure
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Row not found where one was required
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal state transition or double-decide
    #[error("conflict: {0}")]
    Conflict(String),

    /// JSON column failed to (de)serialize
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value failed to parse (status strings, timestamps)
    #[error("invalid stored value: {0}")]
    InvalidValue(String),
}

impl DatabaseError {
    /// True when this error maps to a 404-class response
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DatabaseError::NotFound(_) | DatabaseError::Sqlx(sqlx::Error::RowNotFound)
        )
    }

    /// True when this error maps to a 409-class response
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict(_))
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DatabaseError>;
