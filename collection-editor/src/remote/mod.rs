//! Remote store contract
//!
//! The editor never talks to a concrete backend; it only needs these five
//! operations. All of them are asynchronous and fallible.
//!
//! # 实现
//!
//! - [`MemoryStore`] - 进程内实现 (测试 / 演示)
//! - `collection_client::RestStore` - HTTP 实现

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use shared::error::AppResult;
use shared::message::{ChangeAction, ChangeNotification};
use shared::models::{Item, ItemId, OwnerId};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Remote collection storage
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every item of the owner's collection, in any order
    async fn read_all(&self, owner: &OwnerId) -> AppResult<Vec<Item>>;

    /// Persist the display order: `ordered_ids[i]` gets rank `i`
    async fn write_order(&self, owner: &OwnerId, ordered_ids: &[ItemId]) -> AppResult<()>;

    /// Insert or update one item; returns its id
    async fn upsert_item(&self, owner: &OwnerId, item: &Item) -> AppResult<ItemId>;

    /// Delete one item
    async fn delete_item(&self, owner: &OwnerId, id: &ItemId) -> AppResult<()>;

    /// Subscribe to change notifications for the owner's collection
    fn subscribe(&self, owner: &OwnerId) -> AppResult<Subscription>;
}

/// Change notification stream for one owner
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// stops delivery and cancels any producer task bound to it.
#[derive(Debug)]
pub struct Subscription {
    owner: OwnerId,
    rx: broadcast::Receiver<ChangeNotification>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        owner: OwnerId,
        rx: broadcast::Receiver<ChangeNotification>,
        cancel: CancellationToken,
    ) -> Self {
        Self { owner, rx, cancel }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Next notification for this owner; `None` once the stream is closed
    /// or unsubscribed.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                result = self.rx.recv() => match result {
                    Ok(notification) if notification.concerns(&self.owner) => {
                        return Some(notification);
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // 丢失的通知无法还原，合成一条整体变更以触发重新拉取
                        tracing::warn!(owner = %self.owner, "Subscription lagged {n} notifications");
                        return Some(ChangeNotification::new(
                            self.owner.clone(),
                            ChangeAction::Changed,
                            0,
                        ));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
