//! 进程内远程存储
//!
//! 用于测试或单机演示：数据保存在内存中。只有外部编辑 (`external_*`、
//! [`MemoryStore::notify`]) 会通过 broadcast 通道推送给订阅者，经由
//! [`RemoteStore`] 接口的写入不会回显。支持注入故障与延迟，并记录所有
//! 顺序写入。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use shared::error::{AppError, AppResult};
use shared::message::{ChangeAction, ChangeNotification};
use shared::models::{Item, ItemId, OwnerId};
use tokio::sync::broadcast;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{RemoteStore, Subscription};

/// Broadcast channel 容量
const NOTIFY_CAPACITY: usize = 256;

/// 注入的故障开关
#[derive(Default)]
struct Faults {
    reads: AtomicBool,
    writes: AtomicBool,
    upserts: AtomicBool,
    deletes: AtomicBool,
}

struct Inner {
    /// owner → items (按 rank 排序)
    collections: DashMap<OwnerId, Vec<Item>>,
    tx: broadcast::Sender<ChangeNotification>,
    version: AtomicU64,
    /// 已完成的顺序写入
    writes: Mutex<Vec<(OwnerId, Vec<ItemId>)>>,
    reads: AtomicUsize,
    faults: Faults,
    read_delay: Mutex<Option<Duration>>,
    write_delay: Mutex<Option<Duration>>,
    active_writes: AtomicUsize,
    max_active_writes: AtomicUsize,
}

/// 内存远程存储 (可克隆，克隆共享同一份数据)
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: DashMap::new(),
                tx,
                version: AtomicU64::new(0),
                writes: Mutex::new(Vec::new()),
                reads: AtomicUsize::new(0),
                faults: Faults::default(),
                read_delay: Mutex::new(None),
                write_delay: Mutex::new(None),
                active_writes: AtomicUsize::new(0),
                max_active_writes: AtomicUsize::new(0),
            }),
        }
    }

    // ========================================================================
    // 数据准备与检查
    // ========================================================================

    /// 写入初始数据 (按给定顺序重新编号，不发通知)
    pub fn seed(&self, owner: &OwnerId, mut items: Vec<Item>) {
        renumber(&mut items);
        self.inner.collections.insert(owner.clone(), items);
    }

    /// 当前存储的条目 (按 rank 排序)
    pub fn items(&self, owner: &OwnerId) -> Vec<Item> {
        self.inner
            .collections
            .get(owner)
            .map(|items| items.value().clone())
            .unwrap_or_default()
    }

    /// 当前存储的顺序
    pub fn order(&self, owner: &OwnerId) -> Vec<ItemId> {
        self.items(owner).into_iter().map(|item| item.id).collect()
    }

    /// 所有已完成的顺序写入
    pub fn write_log(&self) -> Vec<(OwnerId, Vec<ItemId>)> {
        self.inner.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.writes.lock().len()
    }

    pub fn read_count(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// 同时进行中的写入的历史最大值
    pub fn max_concurrent_writes(&self) -> usize {
        self.inner.max_active_writes.load(Ordering::SeqCst)
    }

    // ========================================================================
    // 故障与延迟注入
    // ========================================================================

    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.faults.reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.faults.writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_upserts(&self, fail: bool) {
        self.inner.faults.upserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.inner.faults.deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.inner.read_delay.lock() = Some(delay);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.inner.write_delay.lock() = Some(delay);
    }

    // ========================================================================
    // 模拟外部编辑
    // ========================================================================

    /// 模拟另一个编辑者修改顺序 (不记入写入日志)，并推送通知
    pub fn external_reorder(&self, owner: &OwnerId, ordered_ids: &[ItemId]) {
        if let Some(mut items) = self.inner.collections.get_mut(owner) {
            apply_order(&mut items, ordered_ids);
        }
        self.notify(owner, ChangeAction::Reordered, None);
    }

    /// 模拟另一个编辑者新增/修改条目，并推送通知
    pub fn external_upsert(&self, owner: &OwnerId, item: Item) {
        let id = item.id.clone();
        upsert(&mut self.inner.collections.entry(owner.clone()).or_default(), item);
        self.notify(owner, ChangeAction::Upserted, Some(id));
    }

    /// 推送一条变更通知
    pub fn notify(&self, owner: &OwnerId, action: ChangeAction, id: Option<ItemId>) {
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
        let notification = ChangeNotification::new(owner.clone(), action, version);
        let notification = match id {
            Some(id) => notification.with_id(id),
            None => notification,
        };
        let _ = self.inner.tx.send(notification);
    }

    async fn delay(slot: &Mutex<Option<Duration>>) {
        let delay = *slot.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn read_all(&self, owner: &OwnerId) -> AppResult<Vec<Item>> {
        Self::delay(&self.inner.read_delay).await;
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        if self.inner.faults.reads.load(Ordering::SeqCst) {
            return Err(AppError::fetch_failed("injected read failure"));
        }
        Ok(self.items(owner))
    }

    async fn write_order(&self, owner: &OwnerId, ordered_ids: &[ItemId]) -> AppResult<()> {
        let active = self.inner.active_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_active_writes
            .fetch_max(active, Ordering::SeqCst);

        Self::delay(&self.inner.write_delay).await;
        self.inner.active_writes.fetch_sub(1, Ordering::SeqCst);

        if self.inner.faults.writes.load(Ordering::SeqCst) {
            return Err(AppError::persist_failed("injected write failure"));
        }
        if let Some(mut items) = self.inner.collections.get_mut(owner) {
            apply_order(&mut items, ordered_ids);
        }
        self.inner
            .writes
            .lock()
            .push((owner.clone(), ordered_ids.to_vec()));
        Ok(())
    }

    async fn upsert_item(&self, owner: &OwnerId, item: &Item) -> AppResult<ItemId> {
        Self::delay(&self.inner.write_delay).await;
        if self.inner.faults.upserts.load(Ordering::SeqCst) {
            return Err(AppError::internal("injected upsert failure"));
        }
        upsert(
            &mut self.inner.collections.entry(owner.clone()).or_default(),
            item.clone(),
        );
        Ok(item.id.clone())
    }

    async fn delete_item(&self, owner: &OwnerId, id: &ItemId) -> AppResult<()> {
        Self::delay(&self.inner.write_delay).await;
        if self.inner.faults.deletes.load(Ordering::SeqCst) {
            return Err(AppError::internal("injected delete failure"));
        }
        let mut items = self
            .inner
            .collections
            .get_mut(owner)
            .ok_or_else(|| AppError::item_not_found(id.to_string()))?;
        let index = items
            .iter()
            .position(|item| &item.id == id)
            .ok_or_else(|| AppError::item_not_found(id.to_string()))?;
        items.remove(index);
        renumber(&mut items);
        Ok(())
    }

    fn subscribe(&self, owner: &OwnerId) -> AppResult<Subscription> {
        Ok(Subscription::new(
            owner.clone(),
            self.inner.tx.subscribe(),
            CancellationToken::new(),
        ))
    }
}

fn renumber(items: &mut [Item]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.rank = index as u32;
    }
}

/// 按给定 ID 排列；未提及的条目保持原相对顺序排在后面，未知 ID 忽略
fn apply_order(items: &mut Vec<Item>, ordered_ids: &[ItemId]) {
    let mut arranged = Vec::with_capacity(items.len());
    for id in ordered_ids {
        if let Some(index) = items.iter().position(|item| &item.id == id) {
            arranged.push(items.remove(index));
        }
    }
    arranged.append(items);
    renumber(&mut arranged);
    *items = arranged;
}

/// 已存在则保留存储中的 rank 并替换其余字段；否则按传入 rank 插入
fn upsert(items: &mut Vec<Item>, mut item: Item) {
    if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
        item.rank = existing.rank;
        *existing = item;
        return;
    }
    items.push(item);
    items.sort_by_key(|i| i.rank);
    renumber(items);
}
