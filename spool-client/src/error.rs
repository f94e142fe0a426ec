//! Client error types

use thiserror::Error;

/// Errors from the spool daemon API
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or protocol failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request was rejected as invalid (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Daemon-side failure (5xx)
    #[error("Server error: {0}")]
    Internal(String),

    /// Response did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Payload serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
