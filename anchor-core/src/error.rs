//! Error types for anchor core

use thiserror::Error;

/// Result type for anchor core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Anchor core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Backward or otherwise illegal status transition
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Unrecognized fee operation / asset pair
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    NotFound(uuid::Uuid),

    /// Store error (Postgres or in-memory)
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
