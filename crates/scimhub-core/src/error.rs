//! Core error types.

use thiserror::Error;

/// Errors raised by the routing engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument is missing or an event document is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Poll for a subscriber identifier that is not known.
    #[error("subscriber {0} does not exist")]
    UnknownSubscriber(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Record (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Store adapter error not originating from sled.
    #[error("store error: {0}")]
    Store(String),

    /// Push transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether this error was caused by the caller rather than by the hub.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::UnknownSubscriber(_))
    }
}

/// Reject a missing (empty) required argument.
pub(crate) fn require(value: &str, name: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} cannot be empty", name)));
    }
    Ok(())
}
