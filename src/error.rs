//! Error types for filedrop.

use thiserror::Error;

/// Common error type for filedrop.
#[derive(Error, Debug)]
pub enum FiledropError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// A file or a setting was rejected by a validation rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A call into the upload record store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An upload was requested but no entry was pending.
    #[error("no files to upload")]
    NothingToUpload,

    /// A flow stopped because its cancellation token fired.
    #[error("upload cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FiledropError {
    /// Whether this error reports a condition rather than a failure.
    pub fn is_informational(&self) -> bool {
        matches!(self, FiledropError::NothingToUpload)
    }
}

impl From<sqlx::Error> for FiledropError {
    fn from(e: sqlx::Error) -> Self {
        FiledropError::Database(e.to_string())
    }
}

/// Result type alias for filedrop operations.
pub type Result<T> = std::result::Result<T, FiledropError>;
