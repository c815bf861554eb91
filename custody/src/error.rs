//! Error types for the custody engine

use thiserror::Error;

/// Result type for custody operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custody errors
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the core entity layer
    #[error("Core error: {0}")]
    Core(#[from] anchor_core::Error),

    /// Ledger client transport or lookup failure
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Envelope serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Envelope blob encoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Signing key material is malformed
    #[error("Key error: {0}")]
    Key(String),

    /// A field required for submission is not set
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Operation not supported by the custody configuration
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
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
