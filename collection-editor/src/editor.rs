//! CollectionEditor - one owner's collection, drafts and history
//!
//! All state changes are synchronous and run to completion; remote calls
//! (order writes, item saves, fetches) run as spawned tasks and report back
//! through [`EditorEvent`]s. The editor is owned by a single task, usually
//! [`crate::worker::EditorWorker`].

use std::sync::Arc;

use shared::error::AppResult;
use shared::message::ChangeNotification;
use shared::models::{Item, ItemFields, ItemId, OwnerId};
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::core::EditorConfig;
use crate::draft::{EditDraft, NewDraft, RenderedRow, render};
use crate::error::{EditorError, EditorResult};
use crate::event::{EditorEvent, EventSender, emit};
use crate::history::HistoryManager;
use crate::move_translator;
use crate::persister::{DebouncedPersister, PendingWrite};
use crate::reconcile::{self, FetchTicket, ReconcileOutcome, ReconcileState, ReconciliationController};
use crate::remote::RemoteStore;
use crate::store::OrderedItemStore;

pub struct CollectionEditor {
    owner: OwnerId,
    remote: Arc<dyn RemoteStore>,
    events: EventSender,
    store: OrderedItemStore,
    history: HistoryManager,
    persister: DebouncedPersister,
    reconciler: ReconciliationController,
    edit_draft: Option<EditDraft>,
    new_draft: Option<NewDraft>,
    /// Item upsert/delete tasks
    item_tasks: TaskTracker,
}

impl CollectionEditor {
    pub fn new(owner: OwnerId, remote: Arc<dyn RemoteStore>, config: &EditorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let persister = DebouncedPersister::new(
            owner.clone(),
            remote.clone(),
            config.debounce(),
            events.clone(),
        );
        Self {
            store: OrderedItemStore::new(events.clone()),
            history: HistoryManager::new(config.history_limit),
            reconciler: ReconciliationController::new(owner.clone()),
            persister,
            owner,
            remote,
            events,
            edit_draft: None,
            new_draft: None,
            item_tasks: TaskTracker::new(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> EventSender {
        self.events.clone()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn remote(&self) -> Arc<dyn RemoteStore> {
        self.remote.clone()
    }

    pub fn store(&self) -> &OrderedItemStore {
        &self.store
    }

    pub fn items(&self) -> &[Item] {
        self.store.items()
    }

    pub fn ordered_ids(&self) -> Vec<ItemId> {
        self.store.ordered_ids()
    }

    pub fn persister(&self) -> &DebouncedPersister {
        &self.persister
    }

    pub fn pending_write(&self) -> Option<PendingWrite> {
        self.persister.pending()
    }

    pub fn reconcile_state(&self) -> ReconcileState {
        self.reconciler.state()
    }

    pub fn edit_draft(&self) -> Option<&EditDraft> {
        self.edit_draft.as_ref()
    }

    pub fn new_draft(&self) -> Option<&NewDraft> {
        self.new_draft.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Read the collection from the remote store, replacing local state
    pub async fn load(&mut self) -> EditorResult<()> {
        let items = self
            .remote
            .read_all(&self.owner)
            .await
            .map_err(EditorError::FetchFailed)?;
        self.load_items(items);
        Ok(())
    }

    /// Replace the collection with `items` (ordered by their rank). History
    /// is cleared and nothing is persisted.
    pub fn load_items(&mut self, mut items: Vec<Item>) {
        items.sort_by_key(|item| item.rank);
        self.store.replace_all(items);
        self.history.clear();
        tracing::info!(owner = %self.owner, count = self.store.len(), "Collection loaded");
    }

    /// Rows to display: committed items merged with drafts
    pub fn render(&self) -> Vec<RenderedRow> {
        render(
            self.store.items(),
            self.edit_draft.as_ref(),
            self.new_draft.as_ref(),
        )
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Apply a drag gesture over the rendered list.
    /// Returns `false` when it changes nothing.
    pub fn move_row(&mut self, source_index: usize, destination_index: usize) -> EditorResult<bool> {
        let rows = self.render();
        match move_translator::translate(&rows, &self.store, source_index, destination_index)? {
            Some(request) => self.reorder(&request.source_id, request.destination_index),
            None => Ok(false),
        }
    }

    /// Move an item to `destination_index` in store order
    pub fn reorder(&mut self, id: &ItemId, destination_index: usize) -> EditorResult<bool> {
        let from = self
            .store
            .position_of(id)
            .ok_or_else(|| EditorError::NotFound(id.clone()))?;
        if from == destination_index || destination_index >= self.store.len() {
            tracing::trace!(id = %id, destination_index, "Reorder is a no-op");
            return Ok(false);
        }

        self.history.record_before_change(&self.store);
        self.store.reorder(id, destination_index)?;
        self.schedule_persist();
        Ok(true)
    }

    pub fn undo(&mut self) -> bool {
        if !self.history.undo(&mut self.store) {
            return false;
        }
        self.schedule_persist();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.redo(&mut self.store) {
            return false;
        }
        self.schedule_persist();
        true
    }

    /// After a failed order write, persist the current local order.
    /// `false` when there is nothing to retry.
    pub fn retry_persist(&self) -> bool {
        self.persister.retry(self.store.ordered_ids())
    }

    fn schedule_persist(&self) -> PendingWrite {
        self.persister.schedule(self.store.ordered_ids())
    }

    // ========================================================================
    // Committed items
    // ========================================================================

    /// Append a new item and save it remotely; returns its rank
    pub fn add_item(&mut self, item: Item) -> EditorResult<u32> {
        self.store.validate_new(&item)?;

        self.history.record_before_change(&self.store);
        let rank = self.store.add(item.clone())?;
        self.spawn_upsert(item.with_rank(rank));
        Ok(rank)
    }

    /// Delete an item locally and remotely
    pub fn remove_item(&mut self, id: &ItemId) -> EditorResult<Item> {
        if !self.store.contains(id) {
            return Err(EditorError::NotFound(id.clone()));
        }

        self.history.record_before_change(&self.store);
        let removed = self.store.remove(id)?;
        if self.edit_draft.as_ref().is_some_and(|d| &d.id == id) {
            self.edit_draft = None;
        }
        self.spawn_delete(id.clone());
        self.schedule_persist();
        Ok(removed)
    }

    // ========================================================================
    // Drafts
    // ========================================================================

    /// Start editing an item from its committed state
    pub fn begin_edit(&mut self, id: &ItemId) -> EditorResult<&EditDraft> {
        let item = self
            .store
            .get(id)
            .ok_or_else(|| EditorError::NotFound(id.clone()))?;
        Ok(self.edit_draft.insert(EditDraft::from_item(item)))
    }

    pub fn set_edit_draft(&mut self, draft: EditDraft) -> EditorResult<()> {
        if !self.store.contains(&draft.id) {
            return Err(EditorError::NotFound(draft.id));
        }
        self.edit_draft = Some(draft);
        Ok(())
    }

    pub fn clear_edit_draft(&mut self) -> Option<EditDraft> {
        self.edit_draft.take()
    }

    /// Write the edit draft into the collection and save it remotely.
    /// `Ok(None)` when there is no draft.
    pub fn commit_edit(&mut self) -> EditorResult<Option<Item>> {
        let Some(draft) = self.edit_draft.take() else {
            return Ok(None);
        };
        if !draft.fields.has_required() {
            let err = EditorError::invalid_item(format!(
                "item {} requires a title and a target",
                draft.id
            ));
            self.edit_draft = Some(draft);
            return Err(err);
        }

        let active = match self.store.get(&draft.id) {
            Some(item) => draft.active.unwrap_or(item.active),
            None => return Err(EditorError::NotFound(draft.id)),
        };
        let item = self.store.update(&draft.id, draft.fields, active)?.clone();
        tracing::debug!(id = %item.id, "Edit committed");
        self.spawn_upsert(item.clone());
        Ok(Some(item))
    }

    /// Replace the new-item draft's fields; its synthetic id is kept
    pub fn set_new_draft(&mut self, fields: ItemFields) -> &NewDraft {
        let draft = match self.new_draft.take() {
            Some(mut draft) => {
                draft.fields = fields;
                draft
            }
            None => NewDraft::new(fields),
        };
        self.new_draft.insert(draft)
    }

    pub fn clear_new_draft(&mut self) -> Option<NewDraft> {
        self.new_draft.take()
    }

    /// Turn the new-item draft into a committed item
    pub fn commit_new_draft(&mut self) -> EditorResult<u32> {
        let draft = self
            .new_draft
            .as_ref()
            .ok_or_else(|| EditorError::invalid_item("no new item draft"))?;
        if !draft.is_renderable() {
            return Err(EditorError::invalid_item(
                "new item requires a title and a target",
            ));
        }

        let item = Item::new(draft.id.clone(), draft.fields.clone());
        let rank = self.add_item(item)?;
        self.new_draft = None;
        Ok(rank)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Feed a change notification; returns a fetch the caller must run
    pub fn begin_reconcile(&mut self, notification: &ChangeNotification) -> Option<FetchTicket> {
        self.reconciler.on_notification(notification, &self.persister)
    }

    /// Ask for a fetch without a notification (manual refresh)
    pub fn request_refresh(&mut self) -> Option<FetchTicket> {
        self.reconciler.request_fetch(&self.persister)
    }

    /// Follow-up fetch for notifications coalesced during the last one
    pub fn take_rerun(&mut self) -> Option<FetchTicket> {
        self.reconciler.take_rerun(&self.persister)
    }

    /// Future that performs the read for `ticket`
    pub fn fetch_for(
        &self,
        ticket: FetchTicket,
    ) -> impl Future<Output = AppResult<Vec<Item>>> + Send + use<> {
        reconcile::fetch(
            self.remote.clone(),
            self.persister.clone(),
            self.owner.clone(),
            ticket,
        )
    }

    /// Hand a fetch result to the reconciliation controller
    pub fn finish_reconcile(
        &mut self,
        ticket: FetchTicket,
        result: AppResult<Vec<Item>>,
    ) -> ReconcileOutcome {
        let outcome =
            self.reconciler
                .on_fetch_complete(ticket, result, &mut self.store, &self.persister);

        match &outcome {
            ReconcileOutcome::Applied {
                ids,
                cancelled_write,
            } => {
                // snapshots predate the remote order and would overwrite it
                self.history.clear();
                if let Some(draft) = &self.edit_draft
                    && !self.store.contains(&draft.id)
                {
                    tracing::debug!(id = %draft.id, "Edited item removed remotely, draft dropped");
                    self.edit_draft = None;
                }
                emit(
                    &self.events,
                    EditorEvent::Reconciled {
                        ids: ids.clone(),
                        cancelled_write: cancelled_write.as_ref().map(|w| w.ordered_ids.clone()),
                    },
                );
            }
            ReconcileOutcome::Failed(error) => {
                emit(
                    &self.events,
                    EditorEvent::FetchFailed {
                        error: error.clone(),
                    },
                );
            }
            ReconcileOutcome::Refetch(_) | ReconcileOutcome::Stale => {}
        }
        outcome
    }

    /// Run `ticket` (and any follow-up it requires) to completion
    pub async fn reconcile_now(&mut self, ticket: FetchTicket) -> ReconcileOutcome {
        let mut ticket = ticket;
        loop {
            let result = self.fetch_for(ticket).await;
            match self.finish_reconcile(ticket, result) {
                ReconcileOutcome::Refetch(next) => ticket = next,
                outcome => return outcome,
            }
        }
    }

    /// Manual refresh, run to completion. `None` if a fetch is already out.
    pub async fn refresh(&mut self) -> Option<ReconcileOutcome> {
        let ticket = self.request_refresh()?;
        Some(self.reconcile_now(ticket).await)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Send the pending order write now
    pub async fn flush(&self) -> Option<AppResult<()>> {
        self.persister.flush().await
    }

    /// Flush the pending write and wait for every remote call to settle
    pub async fn shutdown(&self) {
        if let Some(Err(e)) = self.persister.flush().await {
            tracing::warn!(owner = %self.owner, "Final order write failed: {e}");
        }
        self.persister.wait_idle().await;
        self.item_tasks.close();
        self.item_tasks.wait().await;
        tracing::info!(owner = %self.owner, "Editor shut down");
    }

    fn spawn_upsert(&self, item: Item) {
        let remote = self.remote.clone();
        let owner = self.owner.clone();
        let events = self.events.clone();
        self.item_tasks.spawn(async move {
            let id = item.id.clone();
            match remote.upsert_item(&owner, &item).await {
                Ok(saved) => {
                    tracing::debug!(owner = %owner, id = %saved, "Item saved");
                    emit(&events, EditorEvent::ItemSaved { id: saved });
                }
                Err(error) => {
                    tracing::warn!(owner = %owner, id = %id, "Item save failed: {error}");
                    emit(&events, EditorEvent::ItemSaveFailed { id, error });
                }
            }
        });
    }

    fn spawn_delete(&self, id: ItemId) {
        let remote = self.remote.clone();
        let owner = self.owner.clone();
        let events = self.events.clone();
        self.item_tasks.spawn(async move {
            match remote.delete_item(&owner, &id).await {
                Ok(()) => {
                    tracing::debug!(owner = %owner, id = %id, "Item deleted");
                    emit(&events, EditorEvent::ItemDeleted { id });
                }
                Err(error) => {
                    tracing::warn!(owner = %owner, id = %id, "Item delete failed: {error}");
                    emit(&events, EditorEvent::ItemDeleteFailed { id, error });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use shared::models::Item;
    use tokio::time::Duration;

    fn owner() -> OwnerId {
        OwnerId::new("club")
    }

    fn item(id: &str) -> Item {
        Item::new(id, ItemFields::new(id, format!("https://{id}")))
    }

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|s| ItemId::new(*s)).collect()
    }

    async fn editor_with(raw: &[&str]) -> (MemoryStore, CollectionEditor) {
        let remote = MemoryStore::new();
        remote.seed(&owner(), raw.iter().map(|id| item(id)).collect());
        let mut editor = CollectionEditor::new(
            owner(),
            Arc::new(remote.clone()),
            &EditorConfig::default(),
        );
        editor.load().await.unwrap();
        (remote, editor)
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_noop_reorder_records_nothing() {
        let (remote, mut editor) = editor_with(&["a", "b", "c"]).await;

        assert!(!editor.reorder(&ItemId::new("b"), 1).unwrap());
        assert!(!editor.reorder(&ItemId::new("b"), 9).unwrap());
        assert!(!editor.move_row(0, 0).unwrap());
        assert!(!editor.can_undo());
        assert!(editor.pending_write().is_none());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_item_errors() {
        let (_remote, mut editor) = editor_with(&["a"]).await;
        let missing = ItemId::new("zz");

        assert_eq!(
            editor.reorder(&missing, 0).unwrap_err(),
            EditorError::NotFound(missing.clone())
        );
        assert!(matches!(
            editor.remove_item(&missing),
            Err(EditorError::NotFound(_))
        ));
        assert!(matches!(
            editor.begin_edit(&missing),
            Err(EditorError::NotFound(_))
        ));
        assert!(matches!(
            editor.add_item(item("a")),
            Err(EditorError::InvalidItem(_))
        ));
        assert!(!editor.can_undo());
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_remove_saves_remotely_and_persists_order() {
        let (remote, mut editor) = editor_with(&["a", "b", "c"]).await;
        let mut events = editor.subscribe_events();

        editor.begin_edit(&ItemId::new("b")).unwrap();
        editor.remove_item(&ItemId::new("b")).unwrap();
        assert!(editor.edit_draft().is_none());
        assert!(editor.can_undo());

        editor.shutdown().await;
        assert_eq!(remote.order(&owner()), ids(&["a", "c"]));
        assert_eq!(remote.write_log(), vec![(owner(), ids(&["a", "c"]))]);

        let mut deleted = false;
        while let Ok(event) = events.try_recv() {
            deleted |= event == EditorEvent::ItemDeleted { id: ItemId::new("b") };
        }
        assert!(deleted);
    }

    #[tokio::test]
    async fn test_commit_edit_updates_and_saves() {
        let (remote, mut editor) = editor_with(&["a", "b"]).await;

        let draft = editor.begin_edit(&ItemId::new("a")).unwrap().clone();
        editor
            .set_edit_draft(draft.with_fields(ItemFields::new("Renamed", "https://a2")).with_active(false))
            .unwrap();
        assert_eq!(editor.render().len(), 1);

        let committed = editor.commit_edit().unwrap().unwrap();
        assert_eq!(committed.fields.title, "Renamed");
        assert!(!committed.active);
        assert_eq!(committed.rank, 0);
        assert!(committed.updated_at.is_some());
        assert_eq!(editor.commit_edit().unwrap(), None);

        editor.shutdown().await;
        let stored = remote.items(&owner());
        assert_eq!(stored[0].fields.title, "Renamed");
        assert!(!stored[0].active);
    }

    #[tokio::test]
    async fn test_invalid_edit_keeps_draft() {
        let (_remote, mut editor) = editor_with(&["a"]).await;
        let draft = editor.begin_edit(&ItemId::new("a")).unwrap().clone();
        editor
            .set_edit_draft(draft.with_fields(ItemFields::new("  ", "https://a")))
            .unwrap();

        assert!(matches!(
            editor.commit_edit(),
            Err(EditorError::InvalidItem(_))
        ));
        assert!(editor.edit_draft().is_some());
        assert_eq!(editor.items()[0].fields.title, "a");
    }

    #[tokio::test]
    async fn test_new_draft_keeps_id_and_commits() {
        let (remote, mut editor) = editor_with(&["a"]).await;

        let id = editor.set_new_draft(ItemFields::new("X", "")).id.clone();
        assert!(matches!(
            editor.commit_new_draft(),
            Err(EditorError::InvalidItem(_))
        ));
        assert_eq!(editor.render().len(), 1);

        assert_eq!(
            editor.set_new_draft(ItemFields::new("X", "http://x")).id,
            id
        );
        let rows = editor.render();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].is_preview());

        assert_eq!(editor.commit_new_draft().unwrap(), 1);
        assert!(editor.new_draft().is_none());
        assert_eq!(editor.ordered_ids(), vec![ItemId::new("a"), id.clone()]);

        editor.shutdown().await;
        assert!(remote.order(&owner()).contains(&id));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_undo_schedules_persist() {
        let (remote, mut editor) = editor_with(&["a", "b", "c"]).await;

        editor.reorder(&ItemId::new("b"), 0).unwrap();
        assert!(editor.undo());
        assert_eq!(editor.pending_write().unwrap().ordered_ids, ids(&["a", "b", "c"]));
        assert!(editor.redo());
        assert!(!editor.redo());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(remote.write_count(), 1);
        assert_eq!(remote.order(&owner()), ids(&["b", "a", "c"]));
    }

    #[tokio::test]
    async fn test_failed_load_keeps_state() {
        let (remote, mut editor) = editor_with(&["a"]).await;
        remote.set_fail_reads(true);
        assert!(matches!(
            editor.load().await,
            Err(EditorError::FetchFailed(_))
        ));
        assert_eq!(editor.ordered_ids(), ids(&["a"]));
    }
}
