//! 编辑器事件
//!
//! 所有异步结果 (持久化、拉取、条目保存) 与顺序变化都通过同一个
//! broadcast 通道发布，UI 层订阅后自行展示。

use shared::error::AppError;
use shared::models::{ItemId, OwnerId};
use tokio::sync::broadcast;

/// 编辑器事件
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// 集合顺序或内容已变更 (每次成功的本地修改后发出)
    OrderChanged { ids: Vec<ItemId> },
    /// 顺序已写入远程存储
    OrderPersisted { owner: OwnerId, ids: Vec<ItemId> },
    /// 顺序写入失败，本地顺序保留
    PersistFailed {
        owner: OwnerId,
        ids: Vec<ItemId>,
        error: AppError,
    },
    /// 条目已保存
    ItemSaved { id: ItemId },
    /// 条目保存失败
    ItemSaveFailed { id: ItemId, error: AppError },
    /// 条目已删除
    ItemDeleted { id: ItemId },
    /// 条目删除失败
    ItemDeleteFailed { id: ItemId, error: AppError },
    /// 已用远程权威数据替换本地集合
    Reconciled {
        ids: Vec<ItemId>,
        /// 被取消的未发送写入
        cancelled_write: Option<Vec<ItemId>>,
    },
    /// 重新拉取失败，本地状态保留
    FetchFailed { error: AppError },
}

/// 事件发送端
pub type EventSender = broadcast::Sender<EditorEvent>;

/// 发布事件；没有订阅者时静默丢弃
pub(crate) fn emit(events: &EventSender, event: EditorEvent) {
    let _ = events.send(event);
}
