use std::sync::Arc;
use std::time::Duration;

use collection_editor::{
    CollectionEditor, EditorConfig, EditorEvent, MemoryStore, ReconcileOutcome, ReconcileState,
    RemoteStore,
};
use shared::models::{Item, ItemFields, ItemId, OwnerId};

const QUIET: Duration = Duration::from_millis(400);

fn owner() -> OwnerId {
    OwnerId::new("chess-club")
}

fn ids(raw: &[&str]) -> Vec<ItemId> {
    raw.iter().map(|s| ItemId::new(*s)).collect()
}

async fn setup(raw: &[&str]) -> (MemoryStore, CollectionEditor) {
    let remote = MemoryStore::new();
    remote.seed(
        &owner(),
        raw.iter()
            .map(|id| Item::new(*id, ItemFields::new(*id, format!("https://{id}.example"))))
            .collect(),
    );
    let config = EditorConfig::with_overrides(QUIET.as_millis() as u64, 50);
    let mut editor = CollectionEditor::new(owner(), Arc::new(remote.clone()), &config);
    editor.load().await.unwrap();
    (remote, editor)
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_burst_of_reorders_writes_once() {
    let (remote, mut editor) = setup(&["a", "b", "c", "d"]).await;

    for (id, to) in [("a", 3), ("b", 2), ("c", 1), ("d", 2), ("a", 0)] {
        assert!(editor.reorder(&ItemId::new(id), to).unwrap());
        tokio::time::advance(Duration::from_millis(50)).await;
    }
    let expected = editor.ordered_ids();
    assert_eq!(remote.write_count(), 0);

    tokio::time::sleep(QUIET * 2).await;

    assert_eq!(remote.write_log(), vec![(owner(), expected.clone())]);
    assert_eq!(remote.order(&owner()), expected);
}

#[tokio::test]
async fn test_move_last_to_front() {
    let (_remote, mut editor) = setup(&["1", "2", "3"]).await;

    assert!(editor.reorder(&ItemId::new("3"), 0).unwrap());

    assert_eq!(editor.ordered_ids(), ids(&["3", "1", "2"]));
    let ranks: Vec<u32> = editor.items().iter().map(|i| i.rank).collect();
    assert_eq!(ranks, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_undo_redo_round_trip() {
    let (_remote, mut editor) = setup(&["A", "B", "C"]).await;

    editor.move_row(1, 0).unwrap();
    assert_eq!(editor.ordered_ids(), ids(&["B", "A", "C"]));

    assert!(editor.undo());
    assert_eq!(editor.ordered_ids(), ids(&["A", "B", "C"]));

    assert!(editor.redo());
    assert_eq!(editor.ordered_ids(), ids(&["B", "A", "C"]));
}

#[tokio::test]
async fn test_new_reorder_after_undo_clears_redo() {
    let (_remote, mut editor) = setup(&["A", "B", "C"]).await;

    editor.move_row(1, 0).unwrap();
    assert!(editor.undo());
    assert!(editor.can_redo());

    editor.move_row(2, 0).unwrap();
    assert!(!editor.can_redo());
    assert!(!editor.redo());
    assert_eq!(editor.ordered_ids(), ids(&["C", "A", "B"]));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_new_draft_is_preview_only() {
    let (remote, mut editor) = setup(&["a", "b"]).await;

    let draft_id = editor
        .set_new_draft(ItemFields::new("X", "http://x"))
        .id
        .clone();
    let rows = editor.render();
    let last = rows.last().unwrap();
    assert_eq!(last.id, draft_id);
    assert!(last.is_preview());
    assert_eq!(last.rank, 2);

    editor.move_row(1, 0).unwrap();
    assert!(!editor.pending_write().unwrap().ordered_ids.contains(&draft_id));
    assert!(editor.move_row(2, 0).is_err());

    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(remote.write_count(), 1);
    assert!(!remote.order(&owner()).contains(&draft_id));
    assert!(!editor.store().contains(&draft_id));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_fetch_wins_over_pending_write() {
    let (remote, mut editor) = setup(&["A", "B", "C"]).await;
    let mut subscription = remote.subscribe(&owner()).unwrap();
    let mut events = editor.subscribe_events();

    editor.reorder(&ItemId::new("C"), 1).unwrap();
    assert_eq!(editor.ordered_ids(), ids(&["A", "C", "B"]));

    // another editor saves [C, A, B] before our quiet period ends
    remote.external_reorder(&owner(), &ids(&["C", "A", "B"]));
    let notification = subscription.recv().await.unwrap();

    let ticket = editor.begin_reconcile(&notification).unwrap();
    assert_eq!(editor.reconcile_state(), ReconcileState::FetchPending);
    let outcome = editor.reconcile_now(ticket).await;

    assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));
    assert_eq!(editor.ordered_ids(), ids(&["C", "A", "B"]));
    assert_eq!(editor.reconcile_state(), ReconcileState::Idle);
    assert!(editor.pending_write().is_none());

    tokio::time::sleep(QUIET * 3).await;
    assert_eq!(remote.write_count(), 0);
    assert_eq!(remote.order(&owner()), ids(&["C", "A", "B"]));

    let mut reconciled = None;
    while let Ok(event) = events.try_recv() {
        if let EditorEvent::Reconciled { cancelled_write, .. } = event {
            reconciled = Some(cancelled_write);
        }
    }
    assert_eq!(reconciled, Some(Some(ids(&["A", "C", "B"]))));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_fetch_racing_a_write_fetches_again() {
    let (remote, mut editor) = setup(&["a", "b", "c"]).await;
    remote.set_write_delay(Duration::from_secs(2));
    let reads_before = remote.read_count();

    editor.reorder(&ItemId::new("b"), 0).unwrap();
    tokio::time::sleep(QUIET + Duration::from_millis(100)).await;
    assert!(editor.persister().is_writing());

    let outcome = editor.refresh().await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));
    assert_eq!(remote.read_count() - reads_before, 2);
    assert_eq!(editor.ordered_ids(), ids(&["b", "a", "c"]));
    assert_eq!(remote.order(&owner()), ids(&["b", "a", "c"]));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_failed_fetch_keeps_local_order() {
    let (remote, mut editor) = setup(&["a", "b", "c"]).await;
    let mut events = editor.subscribe_events();
    editor.reorder(&ItemId::new("c"), 0).unwrap();
    remote.set_fail_reads(true);

    let outcome = editor.refresh().await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Failed(_)));
    assert_eq!(editor.ordered_ids(), ids(&["c", "a", "b"]));
    assert!(editor.pending_write().is_some());

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(event, EditorEvent::FetchFailed { .. });
    }
    assert!(failed);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_persist_failure_then_retry() {
    let (remote, mut editor) = setup(&["a", "b", "c"]).await;
    let mut events = editor.subscribe_events();
    remote.set_fail_writes(true);

    editor.reorder(&ItemId::new("c"), 0).unwrap();
    tokio::time::sleep(QUIET * 2).await;

    assert_eq!(editor.ordered_ids(), ids(&["c", "a", "b"]));
    assert_eq!(remote.order(&owner()), ids(&["a", "b", "c"]));
    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(event, EditorEvent::PersistFailed { .. });
    }
    assert!(failed);

    remote.set_fail_writes(false);
    assert!(editor.retry_persist());
    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(remote.order(&owner()), ids(&["c", "a", "b"]));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_add_and_remove_reach_remote() {
    let (remote, mut editor) = setup(&["a", "b"]).await;

    let added = Item::new("n", ItemFields::new("New", "https://new.example"));
    assert_eq!(editor.add_item(added).unwrap(), 2);
    editor.remove_item(&ItemId::new("a")).unwrap();
    editor.shutdown().await;

    assert_eq!(remote.order(&owner()), ids(&["b", "n"]));
    assert_eq!(remote.read_all(&owner()).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_retry_persists_current_local_order() {
    let (remote, mut editor) = setup(&["a", "b", "c"]).await;
    remote.set_fail_writes(true);

    editor.reorder(&ItemId::new("c"), 0).unwrap(); // c a b
    tokio::time::sleep(QUIET * 2).await;
    remote.set_fail_writes(false);

    editor.reorder(&ItemId::new("b"), 0).unwrap(); // b c a, pending
    assert!(editor.retry_persist());
    tokio::time::sleep(QUIET * 2).await;

    assert_eq!(editor.ordered_ids(), ids(&["b", "c", "a"]));
    assert_eq!(remote.write_log(), vec![(owner(), ids(&["b", "c", "a"]))]);
    assert!(!editor.retry_persist());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_reconcile_drops_failed_write() {
    let (remote, mut editor) = setup(&["a", "b", "c"]).await;
    remote.set_fail_writes(true);

    editor.reorder(&ItemId::new("c"), 0).unwrap();
    tokio::time::sleep(QUIET * 2).await;
    assert!(editor.persister().last_failed().is_some());
    remote.set_fail_writes(false);

    remote.external_reorder(&owner(), &ids(&["b", "a", "c"]));
    let outcome = editor.refresh().await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Applied { .. }));

    assert!(!editor.retry_persist());
    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(remote.write_count(), 0);
    assert_eq!(remote.order(&owner()), ids(&["b", "a", "c"]));
    assert_eq!(editor.ordered_ids(), ids(&["b", "a", "c"]));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_reconcile_clears_undo_history() {
    let (remote, mut editor) = setup(&["a", "b", "c"]).await;

    editor.reorder(&ItemId::new("c"), 0).unwrap();
    assert_eq!(editor.flush().await, Some(Ok(())));
    assert!(editor.can_undo());

    remote.external_reorder(&owner(), &ids(&["b", "c", "a"]));
    editor.refresh().await.unwrap();

    assert!(!editor.can_undo());
    assert!(!editor.undo());
    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(remote.write_count(), 1);
    assert_eq!(remote.order(&owner()), ids(&["b", "c", "a"]));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn test_undo_after_add_or_remove_is_not_wasted() {
    let (remote, mut editor) = setup(&["a", "b"]).await;

    editor
        .add_item(Item::new("n", ItemFields::new("New", "https://new.example")))
        .unwrap();
    assert!(!editor.undo());
    assert_eq!(editor.ordered_ids(), ids(&["a", "b", "n"]));
    assert!(editor.pending_write().is_none());

    editor.reorder(&ItemId::new("n"), 0).unwrap(); // n a b
    editor.remove_item(&ItemId::new("a")).unwrap(); // n b

    // the removal has no order to restore, so undo reverts the reorder
    assert!(editor.undo());
    assert_eq!(editor.ordered_ids(), ids(&["b", "n"]));
    assert!(!editor.undo());

    editor.shutdown().await;
    assert_eq!(remote.write_log(), vec![(owner(), ids(&["b", "n"]))]);
}
