//! Shared types for the collection editor
//!
//! Common types used across the editor core and remote store clients:
//! item models, change notifications, error codes and the response envelope.

pub mod error;
pub mod message;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use message::{ChangeAction, ChangeNotification};
pub use models::{DisplayVariant, Item, ItemFields, ItemId, OwnerId};
