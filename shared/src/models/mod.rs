//! Data models
//!
//! Shared between the editor core and remote store implementations.

pub mod item;

// Re-exports
pub use item::*;
