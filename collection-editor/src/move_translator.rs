//! Drag gesture → store reorder
//!
//! The drag source reports indices into the rendered list, which hides
//! inactive items and may end with a preview row. This maps such a gesture
//! onto an item id and a destination index in store order.

use shared::models::ItemId;

use crate::draft::RenderedRow;
use crate::error::{EditorError, EditorResult};
use crate::store::OrderedItemStore;

/// Concrete reorder derived from a drag gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub source_id: ItemId,
    /// Destination in store (display) order
    pub destination_index: usize,
}

/// Translate `(source_index, destination_index)` over `rows`.
///
/// Returns `Ok(None)` when both indices are equal. Indices past the end of
/// the rendered list or pointing at a preview row are `NotReorderable`.
pub fn translate(
    rows: &[RenderedRow],
    store: &OrderedItemStore,
    source_index: usize,
    destination_index: usize,
) -> EditorResult<Option<MoveRequest>> {
    let source = reorderable_row(rows, source_index)?;
    let destination = reorderable_row(rows, destination_index)?;

    if source_index == destination_index {
        return Ok(None);
    }

    let destination_index = store
        .position_of(&destination.id)
        .ok_or(EditorError::NotReorderable {
            index: destination_index,
        })?;
    if !store.contains(&source.id) {
        return Err(EditorError::NotReorderable {
            index: source_index,
        });
    }

    Ok(Some(MoveRequest {
        source_id: source.id.clone(),
        destination_index,
    }))
}

fn reorderable_row(rows: &[RenderedRow], index: usize) -> EditorResult<&RenderedRow> {
    match rows.get(index) {
        Some(row) if !row.is_preview() => Ok(row),
        _ => Err(EditorError::NotReorderable { index }),
    }
}
