//! Item Model
//!
//! One orderable entry of an owner's collection (for example an outbound
//! link on a profile page).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable item identifier, unique within a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of the entity owning a collection (e.g. a profile)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How an item is presented on the public page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayVariant {
    /// Plain button row
    #[default]
    Button,
    /// Card with description and thumbnail
    Card,
    /// Highlighted, full-width entry
    Featured,
}

impl DisplayVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayVariant::Button => "button",
            DisplayVariant::Card => "card",
            DisplayVariant::Featured => "featured",
        }
    }
}

/// Item payload. The editor core only looks at `title` and `target`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemFields {
    pub title: String,
    /// Link target (URL)
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variant: DisplayVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl ItemFields {
    pub fn new(title: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variant(mut self, variant: DisplayVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Title and target are both non-blank
    pub fn has_required(&self) -> bool {
        !self.title.trim().is_empty() && !self.target.trim().is_empty()
    }
}

/// Item entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Display sort key, contiguous 0..N-1 inside a collection
    pub rank: u32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(flatten)]
    pub fields: ItemFields,
    /// Last local modification (Unix millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

fn default_true() -> bool {
    true
}

impl Item {
    /// Create an active item; the rank is assigned by the collection
    pub fn new(id: impl Into<ItemId>, fields: ItemFields) -> Self {
        Self {
            id: id.into(),
            rank: 0,
            active: true,
            fields,
            updated_at: None,
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Order write payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub ids: Vec<ItemId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_creation() {
        let item = Item::new("a", ItemFields::new("Docs", "https://example.org"));
        assert_eq!(item.id, ItemId::new("a"));
        assert_eq!(item.rank, 0);
        assert!(item.active);
        assert!(item.fields.has_required());
    }

    #[test]
    fn test_has_required_rejects_blank() {
        assert!(!ItemFields::new("  ", "https://x").has_required());
        assert!(!ItemFields::new("X", "").has_required());
        assert!(ItemFields::new("X", "http://x").has_required());
    }

    #[test]
    fn test_item_json_is_flat() {
        let item = Item::new("a", ItemFields::new("Docs", "https://example.org"))
            .with_rank(2)
            .inactive();
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["rank"], 2);
        assert_eq!(json["active"], false);
        assert_eq!(json["title"], "Docs");
        assert_eq!(json["variant"], "button");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_item_deserialize_defaults() {
        let json = r#"{"id":"b","rank":1,"title":"Blog","target":"/blog"}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert!(item.active);
        assert_eq!(item.fields.variant, DisplayVariant::Button);
        assert_eq!(item.updated_at, None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ItemId::generate(), ItemId::generate());
    }
}
