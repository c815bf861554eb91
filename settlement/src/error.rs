//! Error types for the settlement workers

use crate::rails::RailsError;
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transaction store or domain error
    #[error("Core error: {0}")]
    Core(#[from] anchor_core::Error),

    /// Custody or ledger submission error
    #[error("Custody error: {0}")]
    Custody(#[from] custody::Error),

    /// Off-chain rails integration error
    #[error("Rails error: {0}")]
    Rails(String),

    /// The deployment does not implement this rails hook; the worker
    /// that hit it must stop instead of retrying every interval
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<RailsError> for Error {
    fn from(err: RailsError) -> Self {
        match err {
            RailsError::NotImplemented(hook) => Error::NotImplemented(hook),
            RailsError::Other(msg) => Error::Rails(msg),
        }
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
