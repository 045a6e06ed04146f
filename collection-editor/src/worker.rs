//! EditorWorker - 编辑器后台任务
//!
//! 独占 [`CollectionEditor`]，在一个 `select!` 循环中依次处理：
//!
//! 1. 关闭信号 (先发送未完成的顺序写入)
//! 2. 来自 [`EditorHandle`] 的命令
//! 3. 远程存储的变更通知
//! 4. 重新拉取完成的结果
//!
//! 所有状态修改都在这一个任务内完成，无需加锁。

use shared::error::AppResult;
use shared::message::ChangeNotification;
use std::sync::Arc;

use shared::models::{Item, ItemFields, ItemId, OwnerId};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::EditorConfig;
use crate::draft::{EditDraft, NewDraft, RenderedRow};
use crate::editor::CollectionEditor;
use crate::error::{EditorError, EditorResult};
use crate::event::{EditorEvent, EventSender};
use crate::persister::PendingWrite;
use crate::reconcile::{FetchTicket, ReconcileOutcome, ReconcileState};
use crate::remote::{RemoteStore, Subscription};

/// Point-in-time view of the editor
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSnapshot {
    pub items: Vec<Item>,
    pub rows: Vec<RenderedRow>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub pending_write: Option<PendingWrite>,
    pub reconcile_state: ReconcileState,
}

/// 发给 worker 的命令 (每条都带 oneshot 回复)
#[derive(Debug)]
pub enum EditorCommand {
    Load {
        reply: oneshot::Sender<EditorResult<()>>,
    },
    MoveRow {
        source_index: usize,
        destination_index: usize,
        reply: oneshot::Sender<EditorResult<bool>>,
    },
    Reorder {
        id: ItemId,
        destination_index: usize,
        reply: oneshot::Sender<EditorResult<bool>>,
    },
    AddItem {
        item: Item,
        reply: oneshot::Sender<EditorResult<u32>>,
    },
    RemoveItem {
        id: ItemId,
        reply: oneshot::Sender<EditorResult<Item>>,
    },
    BeginEdit {
        id: ItemId,
        reply: oneshot::Sender<EditorResult<EditDraft>>,
    },
    SetEditDraft {
        draft: EditDraft,
        reply: oneshot::Sender<EditorResult<()>>,
    },
    ClearEditDraft {
        reply: oneshot::Sender<Option<EditDraft>>,
    },
    CommitEdit {
        reply: oneshot::Sender<EditorResult<Option<Item>>>,
    },
    SetNewDraft {
        fields: ItemFields,
        reply: oneshot::Sender<NewDraft>,
    },
    ClearNewDraft {
        reply: oneshot::Sender<Option<NewDraft>>,
    },
    CommitNewDraft {
        reply: oneshot::Sender<EditorResult<u32>>,
    },
    Undo {
        reply: oneshot::Sender<bool>,
    },
    Redo {
        reply: oneshot::Sender<bool>,
    },
    RetryPersist {
        reply: oneshot::Sender<bool>,
    },
    /// Manual refresh; replies whether a new fetch was started
    Refresh {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<EditorSnapshot>,
    },
    Flush {
        reply: oneshot::Sender<Option<AppResult<()>>>,
    },
}

type FetchDone = (FetchTicket, AppResult<Vec<Item>>);

pub struct EditorWorker {
    editor: CollectionEditor,
    commands: mpsc::Receiver<EditorCommand>,
    shutdown: CancellationToken,
}

impl EditorWorker {
    pub fn new(
        editor: CollectionEditor,
        config: &EditorConfig,
        shutdown: CancellationToken,
    ) -> (Self, EditorHandle) {
        let (tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let handle = EditorHandle {
            tx,
            events: editor.event_sender(),
        };
        (
            Self {
                editor,
                commands,
                shutdown,
            },
            handle,
        )
    }

    /// Create the worker and run it on a new task
    pub fn spawn(
        editor: CollectionEditor,
        config: &EditorConfig,
        shutdown: CancellationToken,
    ) -> (EditorHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(editor, config, shutdown);
        (handle, tokio::spawn(worker.run()))
    }

    /// Validate `config`, initialize logging from it and run an editor for `owner`
    pub fn start(
        owner: OwnerId,
        remote: Arc<dyn RemoteStore>,
        config: &EditorConfig,
        shutdown: CancellationToken,
    ) -> AppResult<(EditorHandle, JoinHandle<()>)> {
        config.validate()?;
        config.init_logging();
        let editor = CollectionEditor::new(owner, remote, config);
        Ok(Self::spawn(editor, config, shutdown))
    }

    /// Run until shutdown is requested or every handle is dropped
    pub async fn run(self) {
        let Self {
            mut editor,
            mut commands,
            shutdown,
        } = self;
        tracing::info!(owner = %editor.owner(), "EditorWorker started");

        let mut subscription = match editor.remote().subscribe(editor.owner()) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!(owner = %editor.owner(), "Change subscription unavailable: {e}");
                None
            }
        };
        let mut subscribed = subscription.is_some();
        let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchDone>();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    tracing::info!(owner = %editor.owner(), "EditorWorker shutting down");
                    break;
                }

                cmd = commands.recv() => match cmd {
                    Some(cmd) => handle_command(&mut editor, cmd, &fetch_tx, &shutdown).await,
                    None => {
                        tracing::info!(owner = %editor.owner(), "All editor handles dropped");
                        break;
                    }
                },

                Some((ticket, result)) = fetch_rx.recv() => {
                    match editor.finish_reconcile(ticket, result) {
                        ReconcileOutcome::Refetch(next) => {
                            spawn_fetch(&editor, next, &fetch_tx, &shutdown);
                        }
                        _ => {
                            if let Some(rerun) = editor.take_rerun() {
                                spawn_fetch(&editor, rerun, &fetch_tx, &shutdown);
                            }
                        }
                    }
                }

                notification = next_notification(&mut subscription), if subscribed => {
                    match notification {
                        Some(notification) => {
                            if let Some(ticket) = editor.begin_reconcile(&notification) {
                                spawn_fetch(&editor, ticket, &fetch_tx, &shutdown);
                            }
                        }
                        None => {
                            tracing::warn!(owner = %editor.owner(), "Change subscription closed");
                            subscribed = false;
                        }
                    }
                }
            }
        }

        if let Some(subscription) = subscription.take() {
            subscription.unsubscribe();
        }
        editor.shutdown().await;
        tracing::info!(owner = %editor.owner(), "EditorWorker stopped");
    }
}

async fn next_notification(subscription: &mut Option<Subscription>) -> Option<ChangeNotification> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => None,
    }
}

fn spawn_fetch(
    editor: &CollectionEditor,
    ticket: FetchTicket,
    fetch_tx: &mpsc::UnboundedSender<FetchDone>,
    shutdown: &CancellationToken,
) {
    let fetch = editor.fetch_for(ticket);
    let fetch_tx = fetch_tx.clone();
    let shutdown = shutdown.clone();
    tracing::debug!(owner = %editor.owner(), seq = ticket.seq(), "Fetching collection");
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = fetch => {
                let _ = fetch_tx.send((ticket, result));
            }
        }
    });
}

async fn handle_command(
    editor: &mut CollectionEditor,
    cmd: EditorCommand,
    fetch_tx: &mpsc::UnboundedSender<FetchDone>,
    shutdown: &CancellationToken,
) {
    // 回复失败说明调用方已放弃等待，忽略即可
    match cmd {
        EditorCommand::Load { reply } => {
            let _ = reply.send(editor.load().await);
        }
        EditorCommand::MoveRow {
            source_index,
            destination_index,
            reply,
        } => {
            let _ = reply.send(editor.move_row(source_index, destination_index));
        }
        EditorCommand::Reorder {
            id,
            destination_index,
            reply,
        } => {
            let _ = reply.send(editor.reorder(&id, destination_index));
        }
        EditorCommand::AddItem { item, reply } => {
            let _ = reply.send(editor.add_item(item));
        }
        EditorCommand::RemoveItem { id, reply } => {
            let _ = reply.send(editor.remove_item(&id));
        }
        EditorCommand::BeginEdit { id, reply } => {
            let _ = reply.send(editor.begin_edit(&id).cloned());
        }
        EditorCommand::SetEditDraft { draft, reply } => {
            let _ = reply.send(editor.set_edit_draft(draft));
        }
        EditorCommand::ClearEditDraft { reply } => {
            let _ = reply.send(editor.clear_edit_draft());
        }
        EditorCommand::CommitEdit { reply } => {
            let _ = reply.send(editor.commit_edit());
        }
        EditorCommand::SetNewDraft { fields, reply } => {
            let _ = reply.send(editor.set_new_draft(fields).clone());
        }
        EditorCommand::ClearNewDraft { reply } => {
            let _ = reply.send(editor.clear_new_draft());
        }
        EditorCommand::CommitNewDraft { reply } => {
            let _ = reply.send(editor.commit_new_draft());
        }
        EditorCommand::Undo { reply } => {
            let _ = reply.send(editor.undo());
        }
        EditorCommand::Redo { reply } => {
            let _ = reply.send(editor.redo());
        }
        EditorCommand::RetryPersist { reply } => {
            let _ = reply.send(editor.retry_persist());
        }
        EditorCommand::Refresh { reply } => {
            let ticket = editor.request_refresh();
            if let Some(ticket) = ticket {
                spawn_fetch(editor, ticket, fetch_tx, shutdown);
            }
            let _ = reply.send(ticket.is_some());
        }
        EditorCommand::Snapshot { reply } => {
            let _ = reply.send(EditorSnapshot {
                items: editor.items().to_vec(),
                rows: editor.render(),
                can_undo: editor.can_undo(),
                can_redo: editor.can_redo(),
                pending_write: editor.pending_write(),
                reconcile_state: editor.reconcile_state(),
            });
        }
        EditorCommand::Flush { reply } => {
            let _ = reply.send(editor.flush().await);
        }
    }
}

/// 编辑器句柄 (可克隆)，UI 层通过它发送命令并订阅事件
#[derive(Clone, Debug)]
pub struct EditorHandle {
    tx: mpsc::Sender<EditorCommand>,
    events: EventSender,
}

impl EditorHandle {
    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    /// Worker is still accepting commands
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EditorCommand,
    ) -> EditorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| EditorError::Closed)?;
        rx.await.map_err(|_| EditorError::Closed)
    }

    pub async fn load(&self) -> EditorResult<()> {
        self.request(|reply| EditorCommand::Load { reply }).await?
    }

    pub async fn move_row(&self, source_index: usize, destination_index: usize) -> EditorResult<bool> {
        self.request(|reply| EditorCommand::MoveRow {
            source_index,
            destination_index,
            reply,
        })
        .await?
    }

    pub async fn reorder(&self, id: ItemId, destination_index: usize) -> EditorResult<bool> {
        self.request(|reply| EditorCommand::Reorder {
            id,
            destination_index,
            reply,
        })
        .await?
    }

    pub async fn add_item(&self, item: Item) -> EditorResult<u32> {
        self.request(|reply| EditorCommand::AddItem { item, reply })
            .await?
    }

    pub async fn remove_item(&self, id: ItemId) -> EditorResult<Item> {
        self.request(|reply| EditorCommand::RemoveItem { id, reply })
            .await?
    }

    pub async fn begin_edit(&self, id: ItemId) -> EditorResult<EditDraft> {
        self.request(|reply| EditorCommand::BeginEdit { id, reply })
            .await?
    }

    pub async fn set_edit_draft(&self, draft: EditDraft) -> EditorResult<()> {
        self.request(|reply| EditorCommand::SetEditDraft { draft, reply })
            .await?
    }

    pub async fn clear_edit_draft(&self) -> EditorResult<Option<EditDraft>> {
        self.request(|reply| EditorCommand::ClearEditDraft { reply })
            .await
    }

    pub async fn commit_edit(&self) -> EditorResult<Option<Item>> {
        self.request(|reply| EditorCommand::CommitEdit { reply })
            .await?
    }

    pub async fn set_new_draft(&self, fields: ItemFields) -> EditorResult<NewDraft> {
        self.request(|reply| EditorCommand::SetNewDraft { fields, reply })
            .await
    }

    pub async fn clear_new_draft(&self) -> EditorResult<Option<NewDraft>> {
        self.request(|reply| EditorCommand::ClearNewDraft { reply })
            .await
    }

    pub async fn commit_new_draft(&self) -> EditorResult<u32> {
        self.request(|reply| EditorCommand::CommitNewDraft { reply })
            .await?
    }

    pub async fn undo(&self) -> EditorResult<bool> {
        self.request(|reply| EditorCommand::Undo { reply }).await
    }

    pub async fn redo(&self) -> EditorResult<bool> {
        self.request(|reply| EditorCommand::Redo { reply }).await
    }

    pub async fn retry_persist(&self) -> EditorResult<bool> {
        self.request(|reply| EditorCommand::RetryPersist { reply })
            .await
    }

    pub async fn refresh(&self) -> EditorResult<bool> {
        self.request(|reply| EditorCommand::Refresh { reply }).await
    }

    pub async fn snapshot(&self) -> EditorResult<EditorSnapshot> {
        self.request(|reply| EditorCommand::Snapshot { reply })
            .await
    }

    /// Send the pending order write now
    pub async fn flush(&self) -> EditorResult<Option<AppResult<()>>> {
        self.request(|reply| EditorCommand::Flush { reply }).await
    }
}
