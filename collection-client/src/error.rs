//! Client error types

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base URL cannot carry path segments
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Error reported by the server in the response envelope
    #[error("{0}")]
    Api(AppError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api(e) => e,
            ClientError::Http(e) if e.is_timeout() => AppError::timeout(e.to_string()),
            ClientError::Http(e) => AppError::network(e.to_string()),
            ClientError::InvalidUrl(msg) => AppError::config(msg),
            ClientError::InvalidResponse(msg) => {
                AppError::with_message(ErrorCode::InvalidFormat, msg)
            }
            ClientError::Unauthorized => {
                AppError::with_message(ErrorCode::RemoteRejected, "Authentication required")
            }
            ClientError::Forbidden(msg) => AppError::with_message(ErrorCode::RemoteRejected, msg),
            ClientError::NotFound(msg) => AppError::not_found(msg),
            ClientError::Validation(msg) => AppError::validation(msg),
            ClientError::Internal(msg) => AppError::internal(msg),
            ClientError::Serialization(e) => {
                AppError::with_message(ErrorCode::InvalidFormat, e.to_string())
            }
        }
    }
}
