//! RestStore - RemoteStore over the collection REST API
//!
//! | Operation | Request |
//! |-----------|---------|
//! | read_all | `GET {base}/owners/{owner}/items` |
//! | write_order | `PUT {base}/owners/{owner}/order` `{"ids": [...]}` |
//! | upsert_item | `PUT {base}/owners/{owner}/items/{id}` |
//! | delete_item | `DELETE {base}/owners/{owner}/items/{id}` |
//!
//! The API has no push channel, so subscriptions poll `read_all` and emit a
//! notification whenever the collection differs from the previous poll.

use std::time::Duration;

use async_trait::async_trait;
use collection_editor::remote::{RemoteStore, Subscription};
use shared::error::{AppError, AppResult};
use shared::message::{ChangeAction, ChangeNotification};
use shared::models::{Item, ItemId, OrderUpdate, OwnerId};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::http::HttpClient;
use crate::{ClientConfig, ClientResult};

/// Broadcast capacity of a polling subscription
const POLL_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct RestStore {
    http: HttpClient,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            poll_interval: config.poll_interval(),
        })
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn read_all(&self, owner: &OwnerId) -> AppResult<Vec<Item>> {
        let items = self
            .http
            .get::<Vec<Item>>(&["owners", owner.as_str(), "items"])
            .await?;
        Ok(items.unwrap_or_default())
    }

    async fn write_order(&self, owner: &OwnerId, ordered_ids: &[ItemId]) -> AppResult<()> {
        let body = OrderUpdate {
            ids: ordered_ids.to_vec(),
        };
        self.http
            .put::<serde_json::Value, _>(&["owners", owner.as_str(), "order"], &body)
            .await?;
        Ok(())
    }

    async fn upsert_item(&self, owner: &OwnerId, item: &Item) -> AppResult<ItemId> {
        let saved = self
            .http
            .put::<Item, _>(&["owners", owner.as_str(), "items", item.id.as_str()], item)
            .await?;
        Ok(saved.map_or_else(|| item.id.clone(), |saved| saved.id))
    }

    async fn delete_item(&self, owner: &OwnerId, id: &ItemId) -> AppResult<()> {
        self.http
            .delete::<serde_json::Value>(&["owners", owner.as_str(), "items", id.as_str()])
            .await?;
        Ok(())
    }

    fn subscribe(&self, owner: &OwnerId) -> AppResult<Subscription> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::subscription_closed())?;
        let (tx, rx) = broadcast::channel(POLL_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        runtime.spawn(poll_changes(
            self.clone(),
            owner.clone(),
            tx,
            cancel.clone(),
        ));
        tracing::debug!(owner = %owner, interval = ?self.poll_interval, "Polling subscription started");
        Ok(Subscription::new(owner.clone(), rx, cancel))
    }
}

/// Poll until cancelled or every receiver is gone
async fn poll_changes(
    store: RestStore,
    owner: OwnerId,
    tx: broadcast::Sender<ChangeNotification>,
    cancel: CancellationToken,
) {
    let mut last: Option<Vec<Item>> = None;
    let mut version = 0u64;
    let mut interval = tokio::time::interval(store.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        if tx.receiver_count() == 0 {
            break;
        }

        let mut items = match store.read_all(&owner).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(owner = %owner, "Change poll failed: {e}");
                continue;
            }
        };
        items.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));

        match &last {
            Some(previous) if *previous != items => {
                version += 1;
                tracing::debug!(owner = %owner, version, "Remote collection changed");
                let _ = tx.send(ChangeNotification::new(
                    owner.clone(),
                    ChangeAction::Changed,
                    version,
                ));
            }
            _ => {}
        }
        last = Some(items);
    }
    tracing::debug!(owner = %owner, "Polling subscription stopped");
}
