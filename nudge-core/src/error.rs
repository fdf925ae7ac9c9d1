//! Error types for nudge-core

use thiserror::Error;

/// Main error type for the nudge-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error for persisted learning state
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Input that could not be mapped onto a domain value
    #[error("invalid {field}: {message}")]
    InvalidInput { field: String, message: String },
}

impl Error {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for nudge-core
pub type Result<T> = std::result::Result<T, Error>;
