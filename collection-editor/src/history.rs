//! Undo/redo of collection orderings
//!
//! Only orderings are recorded (id lists), never item payloads. Restoring a
//! snapshot re-arranges whatever items the store currently holds.

use std::collections::{HashSet, VecDeque};

use shared::models::{Item, ItemId};

use crate::store::OrderedItemStore;

/// A past ordering of the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySnapshot {
    ids: Vec<ItemId>,
}

impl HistorySnapshot {
    pub fn capture(store: &OrderedItemStore) -> Self {
        Self {
            ids: store.ordered_ids(),
        }
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    undo: VecDeque<HistorySnapshot>,
    redo: Vec<HistorySnapshot>,
    /// Maximum undo depth; oldest snapshots fall off first
    limit: usize,
}

impl HistoryManager {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Capture the pre-mutation order. Any redo history is invalidated.
    pub fn record_before_change(&mut self, store: &OrderedItemStore) {
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(HistorySnapshot::capture(store));
        self.redo.clear();
    }

    /// Restore the most recent snapshot that changes the order; `false`
    /// when there is none. Snapshots that would restore the current order
    /// (an add or remove with no reorder since) are discarded on the way.
    pub fn undo(&mut self, store: &mut OrderedItemStore) -> bool {
        while let Some(snapshot) = self.undo.pop_back() {
            let Some(items) = arrange(store, &snapshot) else {
                tracing::debug!("Undo step leaves the order unchanged, skipped");
                continue;
            };
            self.redo.push(HistorySnapshot::capture(store));
            store.replace_all(items);
            return true;
        }
        tracing::debug!("Nothing to undo");
        false
    }

    /// Re-apply the most recently undone order; `false` when there is nothing to redo
    pub fn redo(&mut self, store: &mut OrderedItemStore) -> bool {
        while let Some(snapshot) = self.redo.pop() {
            let Some(items) = arrange(store, &snapshot) else {
                tracing::debug!("Redo step leaves the order unchanged, skipped");
                continue;
            };
            if self.undo.len() == self.limit {
                self.undo.pop_front();
            }
            self.undo.push_back(HistorySnapshot::capture(store));
            store.replace_all(items);
            return true;
        }
        tracing::debug!("Nothing to redo");
        false
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

/// Store items in snapshot order, or `None` if that is the current order.
/// Snapshot ids the store no longer has are skipped; store items missing
/// from the snapshot follow in their current relative order.
fn arrange(store: &OrderedItemStore, snapshot: &HistorySnapshot) -> Option<Vec<Item>> {
    let mut placed: HashSet<&ItemId> = HashSet::with_capacity(snapshot.ids.len());
    let mut items: Vec<Item> = Vec::with_capacity(store.len());

    for id in &snapshot.ids {
        if let Some(item) = store.get(id)
            && placed.insert(id)
        {
            items.push(item.clone());
        }
    }
    let skipped = snapshot.ids.len() - items.len();
    if skipped > 0 {
        tracing::debug!(skipped, "Snapshot ids no longer in collection");
    }
    items.extend(
        store
            .items()
            .iter()
            .filter(|item| !placed.contains(&item.id))
            .cloned(),
    );

    let unchanged = items
        .iter()
        .map(|item| &item.id)
        .eq(store.items().iter().map(|item| &item.id));
    (!unchanged).then_some(items)
}
