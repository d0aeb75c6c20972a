//! Error types for the Enterprise Q client.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Enterprise Q.
#[derive(Error, Debug)]
pub enum Error {
    /// The bundled service model could not be registered
    #[error("Registration error: {0}")]
    Registration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation missing from the registered service model
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// AWS transport error (credentials, signing, network)
    #[error("AWS error: {0}")]
    Aws(String),

    /// Error response returned by the service
    #[error("Service error ({status}) {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Get the HTTP status code reported by the service, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}
