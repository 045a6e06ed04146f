//! Editor error types
//!
//! Every public editor operation returns [`EditorResult`]. None of these
//! errors is fatal: the collection is left unchanged (or, for persistence
//! failures, keeps its optimistic order) and the caller decides how to
//! surface the problem.

use shared::error::{AppError, ErrorCode};
use shared::models::ItemId;
use thiserror::Error;

/// Editor error type
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditorError {
    /// Duplicate id on add, or an item missing required fields
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Item id is not part of the collection
    #[error("Item not found: {0}")]
    NotFound(ItemId),

    /// Rendered row cannot take part in a reorder (preview row or out of range)
    #[error("Row {index} cannot be reordered")]
    NotReorderable { index: usize },

    /// Order write to the remote store failed; the local order is kept
    #[error("Failed to persist order: {0}")]
    PersistFailed(AppError),

    /// Re-fetch of the canonical collection failed; local state is kept
    #[error("Failed to fetch collection: {0}")]
    FetchFailed(AppError),

    /// Item upsert failed
    #[error("Failed to save item {id}: {source}")]
    SaveFailed { id: ItemId, source: AppError },

    /// Item delete failed
    #[error("Failed to delete item {id}: {source}")]
    DeleteFailed { id: ItemId, source: AppError },

    /// The editor worker has stopped
    #[error("Editor worker stopped")]
    Closed,
}

impl EditorError {
    pub fn invalid_item(msg: impl Into<String>) -> Self {
        Self::InvalidItem(msg.into())
    }

    /// Map onto the shared error code space
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidItem(_) => ErrorCode::InvalidItem,
            Self::NotFound(_) => ErrorCode::ItemNotFound,
            Self::NotReorderable { .. } => ErrorCode::NotReorderable,
            Self::PersistFailed(_) => ErrorCode::PersistFailed,
            Self::FetchFailed(_) => ErrorCode::FetchFailed,
            Self::SaveFailed { source, .. } | Self::DeleteFailed { source, .. } => source.code,
            Self::Closed => ErrorCode::InternalError,
        }
    }

    /// Whether the user can reasonably try again
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl From<EditorError> for AppError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::PersistFailed(source)
            | EditorError::FetchFailed(source)
            | EditorError::SaveFailed { source, .. }
            | EditorError::DeleteFailed { source, .. } => source,
            EditorError::NotFound(id) => AppError::item_not_found(id.to_string()),
            other => AppError::with_message(other.code(), other.to_string()),
        }
    }
}

/// Result type for editor operations
pub type EditorResult<T> = Result<T, EditorError>;
