//! Draft merge engine
//!
//! Builds the list the admin panel renders from the committed collection plus
//! the two kinds of unsaved drafts. [`render`] is pure and cheap enough to run
//! on every keystroke of an edit form.

use serde::{Deserialize, Serialize};
use shared::models::{Item, ItemFields, ItemId};

/// Unsaved edit of an existing item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDraft {
    pub id: ItemId,
    pub fields: ItemFields,
    /// Visibility override; `None` keeps the item's current flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl EditDraft {
    /// Start editing from the item's committed state
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            fields: item.fields.clone(),
            active: None,
        }
    }

    pub fn with_fields(mut self, fields: ItemFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

/// New item being composed, not yet added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDraft {
    /// Synthetic id, kept when the draft is committed
    pub id: ItemId,
    pub fields: ItemFields,
}

impl NewDraft {
    pub fn new(fields: ItemFields) -> Self {
        Self {
            id: ItemId::generate(),
            fields,
        }
    }

    /// Enough fields to be previewed or committed
    pub fn is_renderable(&self) -> bool {
        self.fields.has_required()
    }
}

/// Where a rendered row comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// Committed item (possibly showing edit-draft fields)
    Committed,
    /// Preview of a new draft; never persisted
    Preview,
}

/// One row of the rendered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedRow {
    pub id: ItemId,
    pub rank: u32,
    pub fields: ItemFields,
    pub kind: RowKind,
    /// Fields come from an unsaved edit
    pub edited: bool,
}

impl RenderedRow {
    pub fn is_preview(&self) -> bool {
        self.kind == RowKind::Preview
    }
}

/// Merge committed items with drafts into the visible, rank-sorted list.
///
/// 1. committed items
/// 2. edit draft substitutes fields of the matching item (rank unchanged)
/// 3. renderable new draft appended one rank past the maximum, preview-only
/// 4. inactive items dropped (the preview row is always active)
/// 5. stable sort by rank
pub fn render(items: &[Item], edit: Option<&EditDraft>, new: Option<&NewDraft>) -> Vec<RenderedRow> {
    let mut rows: Vec<RenderedRow> = items
        .iter()
        .filter_map(|item| {
            let draft = edit.filter(|d| d.id == item.id);
            let active = draft.and_then(|d| d.active).unwrap_or(item.active);
            if !active {
                return None;
            }
            Some(RenderedRow {
                id: item.id.clone(),
                rank: item.rank,
                fields: draft.map_or_else(|| item.fields.clone(), |d| d.fields.clone()),
                kind: RowKind::Committed,
                edited: draft.is_some(),
            })
        })
        .collect();

    if let Some(draft) = new.filter(|d| d.is_renderable())
        && !items.iter().any(|item| item.id == draft.id)
    {
        let rank = items.iter().map(|item| item.rank).max().map_or(0, |max| max + 1);
        rows.push(RenderedRow {
            id: draft.id.clone(),
            rank,
            fields: draft.fields.clone(),
            kind: RowKind::Preview,
            edited: false,
        });
    }

    rows.sort_by_key(|row| row.rank);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, rank: u32) -> Item {
        Item::new(id, ItemFields::new(id.to_uppercase(), format!("https://{id}"))).with_rank(rank)
    }

    fn titles(rows: &[RenderedRow]) -> Vec<&str> {
        rows.iter().map(|r| r.fields.title.as_str()).collect()
    }

    #[test]
    fn test_render_plain_collection() {
        let items = vec![item("b", 1), item("a", 0), item("c", 2)];
        let rows = render(&items, None, None);
        assert_eq!(titles(&rows), vec!["A", "B", "C"]);
        assert!(rows.iter().all(|r| !r.is_preview() && !r.edited));
    }

    #[test]
    fn test_render_hides_inactive() {
        let items = vec![item("a", 0), item("b", 1).inactive(), item("c", 2)];
        let rows = render(&items, None, None);
        assert_eq!(titles(&rows), vec!["A", "C"]);
    }

    #[test]
    fn test_edit_draft_substitutes_fields() {
        let items = vec![item("a", 0), item("b", 1)];
        let draft = EditDraft::from_item(&items[0]).with_fields(ItemFields::new("Edited", "/e"));
        let rows = render(&items, Some(&draft), None);
        assert_eq!(titles(&rows), vec!["Edited", "B"]);
        assert_eq!(rows[0].rank, 0);
        assert!(rows[0].edited);
    }

    #[test]
    fn test_edit_draft_can_hide_item() {
        let items = vec![item("a", 0), item("b", 1)];
        let draft = EditDraft::from_item(&items[1]).with_active(false);
        let rows = render(&items, Some(&draft), None);
        assert_eq!(titles(&rows), vec!["A"]);
    }

    #[test]
    fn test_edit_draft_for_unknown_id_is_ignored() {
        let items = vec![item("a", 0)];
        let draft = EditDraft {
            id: ItemId::new("ghost"),
            fields: ItemFields::new("Ghost", "/g"),
            active: None,
        };
        let rows = render(&items, Some(&draft), None);
        assert_eq!(titles(&rows), vec!["A"]);
    }

    #[test]
    fn test_new_draft_appended_as_preview() {
        let items = vec![item("a", 0), item("b", 1).inactive()];
        let draft = NewDraft::new(ItemFields::new("X", "http://x"));
        let rows = render(&items, None, Some(&draft));

        assert_eq!(titles(&rows), vec!["A", "X"]);
        let last = rows.last().unwrap();
        assert!(last.is_preview());
        assert_eq!(last.rank, 2);
        assert_eq!(last.id, draft.id);
    }

    #[test]
    fn test_new_draft_on_empty_collection() {
        let draft = NewDraft::new(ItemFields::new("X", "http://x"));
        let rows = render(&[], None, Some(&draft));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, 0);
    }

    #[test]
    fn test_incomplete_new_draft_not_rendered() {
        let items = vec![item("a", 0)];
        let draft = NewDraft::new(ItemFields::new("X", "   "));
        let rows = render(&items, None, Some(&draft));
        assert_eq!(titles(&rows), vec!["A"]);
    }

    #[test]
    fn test_rendered_row_json_shape() {
        let draft = NewDraft::new(ItemFields::new("X", "http://x"));
        let rows = render(&[], None, Some(&draft));
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["kind"], "preview");
        assert_eq!(json["fields"]["title"], "X");
        assert_eq!(json["edited"], false);
    }
}
