//! Unified error codes for the collection editor
//!
//! This module defines all error codes used across the editor core, the REST
//! client and any server speaking the same envelope.
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Collection errors
//! - 2xxx: Remote store errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Collection ====================
    /// Item not found in the collection
    ItemNotFound = 1001,
    /// Item id already present in the collection
    ItemAlreadyExists = 1002,
    /// Item payload rejected
    InvalidItem = 1003,
    /// Row cannot take part in a reorder
    NotReorderable = 1004,
    /// Owner has no collection
    OwnerNotFound = 1005,
    /// Written order does not match the stored collection
    OrderMismatch = 1006,

    // ==================== 2xxx: Remote store ====================
    /// Network error talking to the remote store
    NetworkError = 2001,
    /// Remote store did not answer in time
    TimeoutError = 2002,
    /// Order write failed
    PersistFailed = 2003,
    /// Collection read failed
    FetchFailed = 2004,
    /// Change subscription closed
    SubscriptionClosed = 2005,
    /// Remote store rejected the request
    RemoteRejected = 2006,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Configuration error
    ConfigError = 9002,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether a caller may retry the same request unchanged
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError | ErrorCode::TimeoutError | ErrorCode::PersistFailed
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",

            // Collection
            ErrorCode::ItemNotFound => "Item not found",
            ErrorCode::ItemAlreadyExists => "Item already exists",
            ErrorCode::InvalidItem => "Invalid item",
            ErrorCode::NotReorderable => "Row cannot be reordered",
            ErrorCode::OwnerNotFound => "Owner not found",
            ErrorCode::OrderMismatch => "Order does not match the collection",

            // Remote
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Remote store timed out",
            ErrorCode::PersistFailed => "Failed to persist order",
            ErrorCode::FetchFailed => "Failed to fetch collection",
            ErrorCode::SubscriptionClosed => "Change subscription closed",
            ErrorCode::RemoteRejected => "Remote store rejected the request",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),

            // Collection
            1001 => Ok(ErrorCode::ItemNotFound),
            1002 => Ok(ErrorCode::ItemAlreadyExists),
            1003 => Ok(ErrorCode::InvalidItem),
            1004 => Ok(ErrorCode::NotReorderable),
            1005 => Ok(ErrorCode::OwnerNotFound),
            1006 => Ok(ErrorCode::OrderMismatch),

            // Remote
            2001 => Ok(ErrorCode::NetworkError),
            2002 => Ok(ErrorCode::TimeoutError),
            2003 => Ok(ErrorCode::PersistFailed),
            2004 => Ok(ErrorCode::FetchFailed),
            2005 => Ok(ErrorCode::SubscriptionClosed),
            2006 => Ok(ErrorCode::RemoteRejected),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::NotFound.code(), 3);
        assert_eq!(ErrorCode::ItemNotFound.code(), 1001);
        assert_eq!(ErrorCode::NotReorderable.code(), 1004);
        assert_eq!(ErrorCode::PersistFailed.code(), 2003);
        assert_eq!(ErrorCode::FetchFailed.code(), 2004);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::Unknown.is_success());
        assert!(!ErrorCode::PersistFailed.is_success());
    }

    #[test]
    fn test_is_transient() {
        assert!(ErrorCode::NetworkError.is_transient());
        assert!(ErrorCode::PersistFailed.is_transient());
        assert!(!ErrorCode::InvalidItem.is_transient());
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4001), Err(InvalidErrorCode(4001)));
    }

    #[test]
    fn test_roundtrip_all_codes() {
        let codes = [
            ErrorCode::Success,
            ErrorCode::Unknown,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::InvalidRequest,
            ErrorCode::InvalidFormat,
            ErrorCode::RequiredField,
            ErrorCode::ItemNotFound,
            ErrorCode::ItemAlreadyExists,
            ErrorCode::InvalidItem,
            ErrorCode::NotReorderable,
            ErrorCode::OwnerNotFound,
            ErrorCode::OrderMismatch,
            ErrorCode::NetworkError,
            ErrorCode::TimeoutError,
            ErrorCode::PersistFailed,
            ErrorCode::FetchFailed,
            ErrorCode::SubscriptionClosed,
            ErrorCode::RemoteRejected,
            ErrorCode::InternalError,
            ErrorCode::ConfigError,
        ];
        for code in codes {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::ItemNotFound).unwrap();
        assert_eq!(json, "1001");
        let code: ErrorCode = serde_json::from_str("2003").unwrap();
        assert_eq!(code, ErrorCode::PersistFailed);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ErrorCode::NotReorderable), "1004");
    }
}
