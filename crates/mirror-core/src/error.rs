//! Error types for httpmirror.

use thiserror::Error;

/// Every failure the mirror can produce.
///
/// The error is `Clone` because a populate job's outcome is broadcast to
/// every request waiting on the same key.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // Request errors
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Origin errors
    #[error("Origin returned an empty body: {0}")]
    EmptyOrigin(String),

    #[error("Origin returned status {status} for {url}")]
    OriginStatus { url: String, status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    // Lifecycle errors
    #[error("context canceled")]
    Canceled,

    #[error("Timeout after {millis}ms: {what}")]
    Timeout { what: String, millis: u128 },

    // Infrastructure errors
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error should be answered with the not-found response.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::EmptyOrigin(_) | Error::OriginStatus { .. }
        )
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(err.to_string())
        } else {
            Error::Io(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {}", err))
    }
}
