//! Collection Editor - 有序集合编辑引擎
//!
//! 管理一个可拖拽排序的条目列表：乐观更新、防抖持久化、多步撤销/重做、
//! 草稿预览，以及对外部变更通知的重新对账。
//!
//! # 模块结构
//!
//! ```text
//! collection-editor/
//! ├── core/            # 配置
//! ├── utils/           # 日志
//! ├── remote/          # 远程存储接口与内存实现
//! ├── store            # 有序集合 (rank 连续)
//! ├── history          # 撤销/重做
//! ├── persister        # 防抖写入
//! ├── draft            # 草稿合并渲染
//! ├── move_translator  # 拖拽手势 → 重排请求
//! ├── reconcile        # 外部变更对账
//! ├── editor           # CollectionEditor
//! └── worker           # EditorWorker / EditorHandle
//! ```
//!
//! # 使用
//!
//! ```ignore
//! let config = EditorConfig::from_env();
//! let remote = Arc::new(MemoryStore::new());
//! let (handle, _task) =
//!     EditorWorker::start(OwnerId::new("club"), remote, &config, CancellationToken::new())?;
//! handle.load().await?;
//! handle.move_row(2, 0).await?;
//! ```

pub mod core;
pub mod draft;
pub mod editor;
pub mod error;
pub mod event;
pub mod history;
pub mod move_translator;
pub mod persister;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod utils;
pub mod worker;

// Re-export 公共类型
pub use crate::core::EditorConfig;
pub use draft::{EditDraft, NewDraft, RenderedRow, RowKind, render};
pub use editor::CollectionEditor;
pub use error::{EditorError, EditorResult};
pub use event::{EditorEvent, EventSender};
pub use history::{HistoryManager, HistorySnapshot};
pub use move_translator::MoveRequest;
pub use persister::{DebouncedPersister, PendingWrite};
pub use reconcile::{FetchTicket, ReconcileOutcome, ReconcileState, ReconciliationController};
pub use remote::{MemoryStore, RemoteStore, Subscription};
pub use store::OrderedItemStore;
pub use worker::{EditorCommand, EditorHandle, EditorSnapshot, EditorWorker};
