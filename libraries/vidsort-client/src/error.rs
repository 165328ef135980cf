//! Error types for the playlist API client.

use thiserror::Error;

/// Errors that can occur when talking to the remote playlist API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure, no HTTP response was received
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Non-2xx HTTP response (other than the idempotent-delete 404 case)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 401 that survived one silent refresh attempt
    #[error("Access token expired and could not be refreshed")]
    AuthExpired,

    /// Failed to parse a server response
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Invalid API base URL
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
