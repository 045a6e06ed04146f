//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::ItemNotFound | Self::OwnerNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists | Self::ItemAlreadyExists | Self::OrderMismatch => {
                StatusCode::CONFLICT
            }

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 502 Bad Gateway (remote store failures surfaced by a proxy)
            Self::PersistFailed | Self::FetchFailed | Self::RemoteRejected => {
                StatusCode::BAD_GATEWAY
            }

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::ConfigError
            | Self::SubscriptionClosed => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::InvalidFormat
            | Self::RequiredField
            | Self::InvalidItem
            | Self::NotReorderable => StatusCode::BAD_REQUEST,
        }
    }

    /// Best-effort mapping from an HTTP status returned by a remote store
    pub fn from_http_status(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::CONFLICT => Self::AlreadyExists,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::ValidationFailed,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Self::TimeoutError,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => Self::NetworkError,
            s if s.is_client_error() => Self::RemoteRejected,
            _ => Self::InternalError,
        }
    }
}
