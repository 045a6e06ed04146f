//! OrderedItemStore - in-memory ordered collection
//!
//! Items are kept in display order with `rank == index`. Every successful
//! mutation re-establishes that invariant and publishes the new id list as
//! [`EditorEvent::OrderChanged`].

use std::collections::HashSet;

use shared::models::{Item, ItemFields, ItemId};
use tokio::sync::broadcast;

use crate::error::{EditorError, EditorResult};
use crate::event::{EditorEvent, EventSender, emit};

/// Observer channel capacity for detached stores
const DETACHED_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct OrderedItemStore {
    /// Sorted by rank, rank == index
    items: Vec<Item>,
    events: EventSender,
}

impl OrderedItemStore {
    pub fn new(events: EventSender) -> Self {
        Self {
            items: Vec::new(),
            events,
        }
    }

    /// Store with its own private event channel
    pub fn detached() -> Self {
        let (events, _) = broadcast::channel(DETACHED_CAPACITY);
        Self::new(events)
    }

    /// Subscribe to order changes
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in display order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Display index of an item
    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    pub fn ordered_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    /// Ranks are exactly 0..len
    pub fn ranks_are_contiguous(&self) -> bool {
        self.items
            .iter()
            .enumerate()
            .all(|(index, item)| item.rank as usize == index)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Move an item to `destination_index` in display order.
    ///
    /// Returns `Ok(false)` without touching anything when the index is out of
    /// bounds or already the item's position.
    pub fn reorder(&mut self, source_id: &ItemId, destination_index: usize) -> EditorResult<bool> {
        let from = self
            .position_of(source_id)
            .ok_or_else(|| EditorError::NotFound(source_id.clone()))?;

        if destination_index >= self.items.len() || destination_index == from {
            return Ok(false);
        }

        let item = self.items.remove(from);
        self.items.insert(destination_index, item);
        self.renumber();

        tracing::debug!(
            id = %source_id,
            from,
            to = destination_index,
            "Item reordered"
        );
        self.publish();
        Ok(true)
    }

    /// Check that `item` could be added, without adding it
    pub fn validate_new(&self, item: &Item) -> EditorResult<()> {
        if self.contains(&item.id) {
            return Err(EditorError::invalid_item(format!(
                "item {} already exists",
                item.id
            )));
        }
        if !item.fields.has_required() {
            return Err(EditorError::invalid_item(format!(
                "item {} requires a title and a target",
                item.id
            )));
        }
        Ok(())
    }

    /// Append an item at `rank = count`; returns the assigned rank
    pub fn add(&mut self, mut item: Item) -> EditorResult<u32> {
        self.validate_new(&item)?;

        let rank = self.items.len() as u32;
        item.rank = rank;
        tracing::debug!(id = %item.id, rank, "Item added");
        self.items.push(item);
        self.publish();
        Ok(rank)
    }

    /// Delete an item and compact the ranks behind it
    pub fn remove(&mut self, id: &ItemId) -> EditorResult<Item> {
        let index = self
            .position_of(id)
            .ok_or_else(|| EditorError::NotFound(id.clone()))?;

        let removed = self.items.remove(index);
        self.renumber();
        tracing::debug!(id = %id, index, "Item removed");
        self.publish();
        Ok(removed)
    }

    /// Replace the payload and visibility of an existing item; rank unchanged
    pub fn update(&mut self, id: &ItemId, fields: ItemFields, active: bool) -> EditorResult<&Item> {
        let index = self
            .position_of(id)
            .ok_or_else(|| EditorError::NotFound(id.clone()))?;

        {
            let item = &mut self.items[index];
            item.fields = fields;
            item.active = active;
            item.updated_at = Some(shared::util::now_millis());
        }
        self.publish();
        Ok(&self.items[index])
    }

    /// Wholesale replacement. The supplied order wins; incoming ranks are
    /// ignored and re-assigned. Later duplicates of an id are dropped.
    pub fn replace_all(&mut self, items: Vec<Item>) {
        let mut seen = HashSet::with_capacity(items.len());
        let before = items.len();

        self.items = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();
        if self.items.len() != before {
            tracing::warn!(
                dropped = before - self.items.len(),
                "Duplicate ids dropped while replacing collection"
            );
        }

        self.renumber();
        self.publish();
    }

    fn renumber(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.rank = index as u32;
        }
    }

    fn publish(&self) {
        emit(
            &self.events,
            EditorEvent::OrderChanged {
                ids: self.ordered_ids(),
            },
        );
    }
}
