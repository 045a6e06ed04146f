//! Debounced order persistence
//!
//! Bursts of reorders collapse into a single `write_order` once the quiet
//! period passes without another [`DebouncedPersister::schedule`].
//!
//! ```text
//! schedule(ids₁) ──┐
//! schedule(ids₂) ──┼── replaces pending, restarts timer
//! schedule(ids₃) ──┘
//!                     … quiet period …
//!                  claim(generation) ──▶ write gate ──▶ write_order(ids₃)
//! ```
//!
//! A timer task may only fire if its generation still owns the pending slot
//! when it wakes; cancelling bumps the generation under the same lock, so a
//! cancelled timer never writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shared::error::AppResult;
use shared::models::{ItemId, OwnerId};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::event::{EditorEvent, EventSender, emit};
use crate::remote::RemoteStore;

/// Scheduled, not yet sent order write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub owner: OwnerId,
    pub ordered_ids: Vec<ItemId>,
    pub deadline: Instant,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<PendingWrite>,
    timer: Option<CancellationToken>,
}

impl Slot {
    /// Drop the pending write and stop its timer
    fn cancel(&mut self) -> Option<PendingWrite> {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.generation += 1;
        self.pending.take()
    }
}

struct Inner {
    slot: Mutex<Slot>,
    /// Serializes writes: at most one in flight per owner
    write_gate: tokio::sync::Mutex<()>,
    /// Claimed but not yet settled writes
    in_flight: watch::Sender<usize>,
    writes_started: AtomicU64,
    last_failed: Mutex<Option<Vec<ItemId>>>,
}

/// Debounced writer for one owner's collection order
#[derive(Clone)]
pub struct DebouncedPersister {
    owner: OwnerId,
    remote: Arc<dyn RemoteStore>,
    quiet_period: Duration,
    events: EventSender,
    inner: Arc<Inner>,
}

impl DebouncedPersister {
    pub fn new(
        owner: OwnerId,
        remote: Arc<dyn RemoteStore>,
        quiet_period: Duration,
        events: EventSender,
    ) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            owner,
            remote,
            quiet_period,
            events,
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::default()),
                write_gate: tokio::sync::Mutex::new(()),
                in_flight,
                writes_started: AtomicU64::new(0),
                last_failed: Mutex::new(None),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Replace any pending write with `ordered_ids` and restart the quiet
    /// period. Must be called inside a tokio runtime.
    pub fn schedule(&self, ordered_ids: Vec<ItemId>) -> PendingWrite {
        let timer = CancellationToken::new();
        let deadline = Instant::now() + self.quiet_period;
        let pending = PendingWrite {
            owner: self.owner.clone(),
            ordered_ids,
            deadline,
        };

        let generation = {
            let mut slot = self.inner.slot.lock();
            if slot.cancel().is_some() {
                tracing::trace!(owner = %self.owner, "Pending write superseded");
            }
            slot.pending = Some(pending.clone());
            slot.timer = Some(timer.clone());
            slot.generation
        };

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = timer.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }
            if let Some(write) = this.claim(Some(generation)) {
                let _ = this.fire(write).await;
            }
        });

        tracing::debug!(
            owner = %self.owner,
            count = pending.ordered_ids.len(),
            "Order write scheduled"
        );
        pending
    }

    /// Drop the pending write, if any. A write that already fired is not affected.
    pub fn cancel_pending(&self) -> Option<PendingWrite> {
        let cancelled = self.inner.slot.lock().cancel();
        if cancelled.is_some() {
            tracing::debug!(owner = %self.owner, "Pending order write cancelled");
        }
        cancelled
    }

    pub fn pending(&self) -> Option<PendingWrite> {
        self.inner.slot.lock().pending.clone()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.slot.lock().pending.is_some()
    }

    /// Send the pending write now instead of waiting for the timer.
    /// Returns `None` when nothing was pending.
    pub async fn flush(&self) -> Option<AppResult<()>> {
        let write = self.claim(None)?;
        Some(self.fire(write).await)
    }

    /// After a failed write, schedule `ordered_ids` (the current local
    /// order) in its place. `false` when no write has failed since the last
    /// success or reset.
    pub fn retry(&self, ordered_ids: Vec<ItemId>) -> bool {
        if self.inner.last_failed.lock().take().is_none() {
            return false;
        }
        tracing::info!(owner = %self.owner, "Retrying failed order write");
        self.schedule(ordered_ids);
        true
    }

    /// Forget a failed write; a retry becomes a no-op
    pub fn reset_failure(&self) -> Option<Vec<ItemId>> {
        let failed = self.inner.last_failed.lock().take();
        if failed.is_some() {
            tracing::debug!(owner = %self.owner, "Failed order write discarded");
        }
        failed
    }

    /// Order of the most recent failed write, if it has not been retried
    pub fn last_failed(&self) -> Option<Vec<ItemId>> {
        self.inner.last_failed.lock().clone()
    }

    /// Number of writes that have fired since creation
    pub fn writes_started(&self) -> u64 {
        self.inner.writes_started.load(Ordering::SeqCst)
    }

    /// A fired write has not settled yet
    pub fn is_writing(&self) -> bool {
        *self.inner.in_flight.borrow() > 0
    }

    /// Wait until every fired write has settled
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Take the pending write if `generation` (when given) still owns it
    fn claim(&self, generation: Option<u64>) -> Option<PendingWrite> {
        let mut slot = self.inner.slot.lock();
        if generation.is_some_and(|g| g != slot.generation) {
            return None;
        }
        let write = slot.cancel()?;
        self.inner.writes_started.fetch_add(1, Ordering::SeqCst);
        self.inner.in_flight.send_modify(|count| *count += 1);
        Some(write)
    }

    async fn fire(&self, write: PendingWrite) -> AppResult<()> {
        // settles the claim even if this future is dropped mid-write
        let _settle = InFlightGuard(&self.inner.in_flight);
        let result = {
            let _gate = self.inner.write_gate.lock().await;
            self.remote
                .write_order(&write.owner, &write.ordered_ids)
                .await
        };

        match &result {
            Ok(()) => {
                tracing::debug!(
                    owner = %write.owner,
                    count = write.ordered_ids.len(),
                    "Order persisted"
                );
                *self.inner.last_failed.lock() = None;
                emit(
                    &self.events,
                    EditorEvent::OrderPersisted {
                        owner: write.owner.clone(),
                        ids: write.ordered_ids.clone(),
                    },
                );
            }
            Err(e) => {
                tracing::warn!(owner = %write.owner, "Order write failed: {e}");
                *self.inner.last_failed.lock() = Some(write.ordered_ids.clone());
                emit(
                    &self.events,
                    EditorEvent::PersistFailed {
                        owner: write.owner.clone(),
                        ids: write.ordered_ids.clone(),
                        error: e.clone(),
                    },
                );
            }
        }

        result
    }
}

/// Releases one claimed write on drop
struct InFlightGuard<'a>(&'a watch::Sender<usize>);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count = count.saturating_sub(1));
    }
}
