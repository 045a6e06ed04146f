//! Reconciliation with externally caused changes
//!
//! ```text
//!          notification                 fetch ok
//!   Idle ───────────────▶ FetchPending ───────────▶ Reconciled ──▶ Idle
//!     ▲                        │
//!     └──────── fetch err ─────┘
//! ```
//!
//! The fetched collection is authoritative: it replaces the store and drops
//! any order write that is still waiting for its quiet period. A write that
//! already fired is never recalled. When one fired while the fetch was out,
//! the fetched data may predate it, so the result is discarded and a single
//! follow-up fetch runs after in-flight writes settle; that one is applied
//! as is.

use std::sync::Arc;

use shared::error::{AppError, AppResult};
use shared::message::ChangeNotification;
use shared::models::{Item, ItemId, OwnerId};

use crate::persister::{DebouncedPersister, PendingWrite};
use crate::remote::RemoteStore;
use crate::store::OrderedItemStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    FetchPending,
    Reconciled,
}

/// Identifies one outstanding fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
    writes_at_start: u64,
    writing_at_start: bool,
    follow_up: bool,
}

impl FetchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Issued because a write raced the previous fetch
    pub fn is_follow_up(&self) -> bool {
        self.follow_up
    }
}

/// Result of handing a fetch result to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Store replaced with the fetched order
    Applied {
        ids: Vec<ItemId>,
        cancelled_write: Option<PendingWrite>,
    },
    /// A write raced the fetch; run this ticket next
    Refetch(FetchTicket),
    /// Fetch failed; local state untouched
    Failed(AppError),
    /// Result of a fetch that is no longer outstanding
    Stale,
}

#[derive(Debug)]
pub struct ReconciliationController {
    owner: OwnerId,
    state: ReconcileState,
    next_seq: u64,
    outstanding: Option<u64>,
    /// A notification arrived while a fetch was out
    rerun: bool,
    last_version: u64,
    reconciliations: u64,
}

impl ReconciliationController {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            state: ReconcileState::Idle,
            next_seq: 0,
            outstanding: None,
            rerun: false,
            last_version: 0,
            reconciliations: 0,
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// Completed reconciliations since creation
    pub fn reconciliations(&self) -> u64 {
        self.reconciliations
    }

    /// Highest notification version seen
    pub fn last_version(&self) -> u64 {
        self.last_version
    }

    pub fn has_rerun(&self) -> bool {
        self.rerun
    }

    /// Handle an external change notification. Returns the ticket of a fetch
    /// the caller must run, or `None` when the notification is ignored or
    /// folded into the fetch already outstanding.
    pub fn on_notification(
        &mut self,
        notification: &ChangeNotification,
        persister: &DebouncedPersister,
    ) -> Option<FetchTicket> {
        if !notification.concerns(&self.owner) {
            tracing::trace!(
                owner = %self.owner,
                other = %notification.owner_id,
                "Notification for another owner ignored"
            );
            return None;
        }
        self.last_version = self.last_version.max(notification.version);
        tracing::debug!(
            owner = %self.owner,
            action = %notification.action,
            version = notification.version,
            "External change notified"
        );
        self.request_fetch(persister)
    }

    /// Start a fetch unless one is already outstanding
    pub fn request_fetch(&mut self, persister: &DebouncedPersister) -> Option<FetchTicket> {
        if self.state == ReconcileState::FetchPending {
            self.rerun = true;
            tracing::debug!(owner = %self.owner, "Fetch already pending, coalesced");
            return None;
        }
        Some(self.issue(persister, false))
    }

    /// Follow-up fetch for notifications coalesced during the last one
    pub fn take_rerun(&mut self, persister: &DebouncedPersister) -> Option<FetchTicket> {
        if self.state != ReconcileState::Idle || !self.rerun {
            return None;
        }
        self.rerun = false;
        Some(self.issue(persister, false))
    }

    /// Apply (or discard) the result of the fetch identified by `ticket`
    pub fn on_fetch_complete(
        &mut self,
        ticket: FetchTicket,
        result: AppResult<Vec<Item>>,
        store: &mut OrderedItemStore,
        persister: &DebouncedPersister,
    ) -> ReconcileOutcome {
        if self.outstanding != Some(ticket.seq) {
            tracing::debug!(owner = %self.owner, seq = ticket.seq, "Stale fetch result dropped");
            return ReconcileOutcome::Stale;
        }

        let mut items = match result {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(owner = %self.owner, "Re-fetch failed, keeping local state: {e}");
                self.outstanding = None;
                self.state = ReconcileState::Idle;
                return ReconcileOutcome::Failed(e);
            }
        };

        let raced = ticket.writing_at_start
            || persister.writes_started() != ticket.writes_at_start
            || persister.is_writing();
        if raced && !ticket.follow_up {
            // the follow-up starts after this point, so it also covers any
            // notification coalesced so far
            self.rerun = false;
            let follow_up = self.issue(persister, true);
            tracing::info!(
                owner = %self.owner,
                seq = follow_up.seq,
                "Order write raced the fetch, fetching again"
            );
            return ReconcileOutcome::Refetch(follow_up);
        }

        let cancelled_write = persister.cancel_pending();
        persister.reset_failure();
        items.sort_by_key(|item| item.rank);
        store.replace_all(items);
        self.outstanding = None;
        self.state = ReconcileState::Reconciled;
        self.reconciliations += 1;

        let ids = store.ordered_ids();
        tracing::info!(
            owner = %self.owner,
            count = ids.len(),
            cancelled = cancelled_write.is_some(),
            "Collection reconciled"
        );
        self.state = ReconcileState::Idle;
        ReconcileOutcome::Applied {
            ids,
            cancelled_write,
        }
    }

    fn issue(&mut self, persister: &DebouncedPersister, follow_up: bool) -> FetchTicket {
        self.next_seq += 1;
        self.outstanding = Some(self.next_seq);
        self.state = ReconcileState::FetchPending;
        FetchTicket {
            seq: self.next_seq,
            writes_at_start: persister.writes_started(),
            writing_at_start: !follow_up && persister.is_writing(),
            follow_up,
        }
    }
}

/// Run the read for `ticket`. Follow-up fetches wait for in-flight writes first.
pub async fn fetch(
    remote: Arc<dyn RemoteStore>,
    persister: DebouncedPersister,
    owner: OwnerId,
    ticket: FetchTicket,
) -> AppResult<Vec<Item>> {
    if ticket.follow_up {
        persister.wait_idle().await;
    }
    remote.read_all(&owner).await
}
