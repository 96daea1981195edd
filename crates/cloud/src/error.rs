//! Error types for the remote collaborators.

use thiserror::Error;

/// Errors produced by the processing, weather and geocode clients.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response without a service error body.
    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    /// The service answered with an `{"error": ...}` body.
    #[error("service error: {0}")]
    Service(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    Network(String),
}

impl CloudError {
    pub(crate) fn status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
