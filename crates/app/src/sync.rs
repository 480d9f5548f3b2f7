use std::{collections::VecDeque, future::Future};

use chrono::{DateTime, Utc};
use jobtrack_core::projector::Projector;
use jobtrack_core::stats::{board_stats, BoardStats};
use jobtrack_core::{
    resolve_drag, AppliedMutation, Application, ApplicationId, Board, BoardError, BoardMutation,
    BoardSnapshot, DragEnd, NewApplication, Patch, Stage, SyncStatus,
};
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::BoardBackend;
use crate::events::BoardEvents;

const COMMAND_CAPACITY: usize = 64;
const OPERATION_HISTORY: usize = 64;

/// Cloneable handle to the board worker.
#[derive(Clone)]
pub struct BoardService {
    sender: mpsc::Sender<BoardCommand>,
}

impl BoardService {
    pub fn new<B: BoardBackend>(
        backend: B,
        events: BoardEvents,
        board: Board,
    ) -> (Self, BoardWorker<B>) {
        let (sender, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let worker = BoardWorker {
            board,
            backend,
            events,
            receiver,
            loopback: sender.downgrade(),
            version: 0,
            status: SyncStatus::default(),
            loading_ops: 0,
            operations: VecDeque::new(),
        };
        (Self { sender }, worker)
    }

    pub async fn snapshot(&self) -> Result<BoardSnapshot, SyncError> {
        self.request(|reply| BoardCommand::Snapshot { reply }).await
    }

    pub async fn stats(&self) -> Result<BoardStats, SyncError> {
        self.request(|reply| BoardCommand::Stats { reply }).await
    }

    pub async fn get(&self, id: ApplicationId) -> Result<Application, SyncError> {
        self.request(|reply| BoardCommand::Get { id, reply })
            .await?
            .map_err(SyncError::from)
    }

    /// Applies a finished drag gesture; cross-stage moves are confirmed in the background.
    pub async fn drag_end(&self, drag: DragEnd) -> Result<DragOutcome, SyncError> {
        self.request(|reply| BoardCommand::DragEnd { drag, reply })
            .await?
            .map_err(SyncError::from)
    }

    /// Queues a full refresh from the backend without waiting for it.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.sender
            .send(BoardCommand::Refresh)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn create(&self, application: NewApplication) -> Result<Application, SyncError> {
        self.request(|reply| BoardCommand::Create { application, reply })
            .await?
    }

    pub async fn update(&self, application: Application) -> Result<Application, SyncError> {
        self.request(|reply| BoardCommand::Update { application, reply })
            .await?
    }

    pub async fn delete(&self, id: ApplicationId) -> Result<(), SyncError> {
        self.request(|reply| BoardCommand::Delete { id, reply })
            .await?
    }

    /// Recent backend operations, oldest first.
    pub async fn operations(&self) -> Result<Vec<Operation>, SyncError> {
        self.request(|reply| BoardCommand::Operations { reply })
            .await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> BoardCommand,
    ) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| SyncError::ChannelClosed)?;
        response.await.map_err(|_| SyncError::ChannelClosed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("board worker channel closed")]
    ChannelClosed,
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("operation {op} failed to confirm: {message}")]
    ConfirmFailed { op: Uuid, message: String },
}

/// Result of a drag gesture, returned before any backend confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DragOutcome {
    Unchanged,
    Reordered {
        stage: Stage,
        order: Vec<ApplicationId>,
    },
    Moved {
        op_id: Uuid,
        id: ApplicationId,
        from: Stage,
        to: Stage,
    },
}

/// Lifecycle of a backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    AppliedLocally,
    Confirming,
    Confirmed,
    ConfirmFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Move,
    Refresh,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Refresh => "refresh",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub op_id: Uuid,
    pub kind: OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationId>,
    pub state: SyncState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

type Reply<T> = oneshot::Sender<T>;

const SHUTTING_DOWN: &str = "worker shutting down";

enum BoardCommand {
    Snapshot {
        reply: Reply<BoardSnapshot>,
    },
    Stats {
        reply: Reply<BoardStats>,
    },
    Get {
        id: ApplicationId,
        reply: Reply<Result<Application, BoardError>>,
    },
    DragEnd {
        drag: DragEnd,
        reply: Reply<Result<DragOutcome, BoardError>>,
    },
    Refresh,
    Create {
        application: NewApplication,
        reply: Reply<Result<Application, SyncError>>,
    },
    Update {
        application: Application,
        reply: Reply<Result<Application, SyncError>>,
    },
    Delete {
        id: ApplicationId,
        reply: Reply<Result<(), SyncError>>,
    },
    Operations {
        reply: Reply<Vec<Operation>>,
    },
    Completed(Completion),
}

/// Backend results posted back onto the worker queue by spawned tasks.
enum Completion {
    StageConfirmed {
        op_id: Uuid,
        result: Result<Option<Application>, String>,
    },
    Refreshed {
        op_id: Uuid,
        result: Result<Vec<Application>, String>,
    },
    Created {
        op_id: Uuid,
        result: Result<Application, String>,
        reply: Reply<Result<Application, SyncError>>,
    },
    Updated {
        op_id: Uuid,
        result: Result<Application, String>,
        reply: Reply<Result<Application, SyncError>>,
    },
    Deleted {
        op_id: Uuid,
        id: ApplicationId,
        result: Result<(), String>,
        reply: Reply<Result<(), SyncError>>,
    },
}

/// Sole owner of the board. Commands and backend completions are handled one
/// at a time in arrival order, so whichever result lands last wins.
pub struct BoardWorker<B> {
    board: Board,
    backend: B,
    events: BoardEvents,
    receiver: mpsc::Receiver<BoardCommand>,
    loopback: mpsc::WeakSender<BoardCommand>,
    version: u64,
    status: SyncStatus,
    loading_ops: usize,
    operations: VecDeque<Operation>,
}

impl<B: BoardBackend> BoardWorker<B> {
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(mut self) {
        info!(
            stage = "sync",
            applications = self.board.store().len(),
            "board worker started"
        );
        while let Some(command) = self.receiver.recv().await {
            self.handle(command);
        }
        debug!(stage = "sync", "board worker stopped");
    }

    fn handle(&mut self, command: BoardCommand) {
        match command {
            BoardCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            BoardCommand::Stats { reply } => {
                let _ = reply.send(board_stats(&self.board, Utc::now().date_naive()));
            }
            BoardCommand::Get { id, reply } => {
                let _ = reply.send(self.board.get(&id).cloned());
            }
            BoardCommand::DragEnd { drag, reply } => {
                let _ = reply.send(self.drag_end(drag));
            }
            BoardCommand::Refresh => self.start_refresh(),
            BoardCommand::Create { application, reply } => self.start_create(application, reply),
            BoardCommand::Update { application, reply } => self.start_update(application, reply),
            BoardCommand::Delete { id, reply } => self.start_delete(id, reply),
            BoardCommand::Operations { reply } => {
                let _ = reply.send(self.operations.iter().cloned().collect());
            }
            BoardCommand::Completed(completion) => self.complete(completion),
        }
    }

    fn snapshot(&self) -> BoardSnapshot {
        self.board.snapshot(self.version, self.status.clone())
    }

    fn drag_end(&mut self, drag: DragEnd) -> Result<DragOutcome, BoardError> {
        let Some(mutation) = resolve_drag(&self.board, &drag) else {
            debug!(stage = "sync", active = %drag.active, "drag produced no change");
            return Ok(DragOutcome::Unchanged);
        };

        match self.apply(mutation)? {
            AppliedMutation::Reordered { stage, order } => {
                Ok(DragOutcome::Reordered { stage, order })
            }
            AppliedMutation::Moved { id, from, to, .. } => {
                let op_id = self.begin(
                    OperationKind::Move,
                    Some(id.clone()),
                    SyncState::AppliedLocally,
                );
                let backend = self.backend.clone();
                let target = id.clone();
                let spawned = self.spawn_backend(async move {
                    let result = backend
                        .update_stage(target, to)
                        .await
                        .map_err(|err| err.to_string());
                    Completion::StageConfirmed { op_id, result }
                });
                if spawned {
                    self.transition(op_id, SyncState::Confirming, None);
                    self.status.pending_confirmations += 1;
                } else {
                    self.fail(op_id, SHUTTING_DOWN.to_string());
                }
                self.publish_status();
                info!(stage = "sync", %op_id, application = %id, %from, %to, "application moved; confirming");
                Ok(DragOutcome::Moved {
                    op_id,
                    id,
                    from,
                    to,
                })
            }
            other => {
                warn!(stage = "sync", ?other, "unexpected drag mutation");
                Ok(DragOutcome::Unchanged)
            }
        }
    }

    fn start_refresh(&mut self) {
        let op_id = self.begin(OperationKind::Refresh, None, SyncState::Confirming);
        let backend = self.backend.clone();
        if self.spawn_backend(async move {
            let result = backend.fetch_all().await.map_err(|err| err.to_string());
            Completion::Refreshed { op_id, result }
        }) {
            self.start_loading();
        } else {
            self.abandon(op_id);
        }
    }

    fn start_create(
        &mut self,
        application: NewApplication,
        reply: Reply<Result<Application, SyncError>>,
    ) {
        let op_id = self.begin(OperationKind::Create, None, SyncState::Confirming);
        let backend = self.backend.clone();
        if self.spawn_backend(async move {
            let result = backend
                .create(application)
                .await
                .map_err(|err| err.to_string());
            Completion::Created {
                op_id,
                result,
                reply,
            }
        }) {
            self.start_loading();
        } else {
            self.abandon(op_id);
        }
    }

    fn start_update(
        &mut self,
        application: Application,
        reply: Reply<Result<Application, SyncError>>,
    ) {
        if let Err(err) = self.check_update(&application) {
            let _ = reply.send(Err(err.into()));
            return;
        }
        let op_id = self.begin(
            OperationKind::Update,
            Some(application.id.clone()),
            SyncState::Confirming,
        );
        let backend = self.backend.clone();
        let spawned = self.spawn_backend(async move {
            let result = backend
                .update(application)
                .await
                .map_err(|err| err.to_string());
            Completion::Updated {
                op_id,
                result,
                reply,
            }
        });
        if !spawned {
            self.abandon(op_id);
        }
    }

    fn check_update(&self, application: &Application) -> Result<(), BoardError> {
        self.board.get(&application.id)?;
        if application.stage.known().is_none() {
            return Err(BoardError::UnknownStage {
                id: application.id.clone(),
                stage: application.stage.to_string(),
            });
        }
        Ok(())
    }

    fn start_delete(&mut self, id: ApplicationId, reply: Reply<Result<(), SyncError>>) {
        if let Err(err) = self.board.get(&id) {
            let _ = reply.send(Err(err.into()));
            return;
        }
        let op_id = self.begin(OperationKind::Delete, Some(id.clone()), SyncState::Confirming);
        let backend = self.backend.clone();
        let spawned = self.spawn_backend(async move {
            let result = backend
                .delete(id.clone())
                .await
                .map_err(|err| err.to_string());
            Completion::Deleted {
                op_id,
                id,
                result,
                reply,
            }
        });
        if !spawned {
            self.abandon(op_id);
        }
    }

    fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::StageConfirmed { op_id, result } => {
                self.status.pending_confirmations =
                    self.status.pending_confirmations.saturating_sub(1);
                match result {
                    Ok(record) => {
                        counter!("board_confirmations_total", "result" => "confirmed").increment(1);
                        self.transition(op_id, SyncState::Confirmed, None);
                        if let Some(record) = record {
                            self.refresh_record(record);
                        }
                        debug!(stage = "sync", %op_id, "stage change confirmed");
                    }
                    Err(message) => {
                        counter!("board_confirmations_total", "result" => "failed").increment(1);
                        self.fail(op_id, message);
                    }
                }
                self.publish_status();
            }
            Completion::Refreshed { op_id, result } => {
                self.finish_loading();
                match result {
                    Ok(records) => {
                        counter!("board_refresh_total", "result" => "success").increment(1);
                        self.transition(op_id, SyncState::Confirmed, None);
                        let count = records.len();
                        if let Err(err) = self.apply(BoardMutation::ReplaceAll(records)) {
                            error!(stage = "sync", error = %err, "refresh could not be applied");
                        }
                        info!(stage = "sync", %op_id, applications = count, "board refreshed");
                    }
                    Err(message) => {
                        counter!("board_refresh_total", "result" => "failed").increment(1);
                        self.fail(op_id, message);
                    }
                }
                self.publish_status();
            }
            Completion::Created {
                op_id,
                result,
                reply,
            } => {
                self.finish_loading();
                let outcome = match result {
                    Ok(record) => {
                        self.transition(op_id, SyncState::Confirmed, None);
                        self.set_operation_application(op_id, &record.id);
                        if let Err(err) = self.apply(BoardMutation::Insert(record.clone())) {
                            error!(stage = "sync", error = %err, "created application could not be placed");
                        }
                        Ok(record)
                    }
                    Err(message) => Err(self.fail(op_id, message)),
                };
                self.publish_status();
                let _ = reply.send(outcome);
            }
            Completion::Updated {
                op_id,
                result,
                reply,
            } => {
                let outcome = match result {
                    Ok(record) => {
                        self.transition(op_id, SyncState::Confirmed, None);
                        self.apply(BoardMutation::Update(record.clone()))
                            .map(|_| record)
                            .map_err(SyncError::from)
                    }
                    Err(message) => {
                        let err = self.fail(op_id, message);
                        self.publish_status();
                        Err(err)
                    }
                };
                let _ = reply.send(outcome);
            }
            Completion::Deleted {
                op_id,
                id,
                result,
                reply,
            } => {
                let outcome = match result {
                    Ok(()) => {
                        self.transition(op_id, SyncState::Confirmed, None);
                        if let Err(err) = self.apply(BoardMutation::Remove(id.clone())) {
                            debug!(stage = "sync", application = %id, error = %err, "deleted application already gone");
                        }
                        Ok(())
                    }
                    Err(message) => {
                        let err = self.fail(op_id, message);
                        self.publish_status();
                        Err(err)
                    }
                };
                let _ = reply.send(outcome);
            }
        }
    }

    /// Replaces a record with the copy the backend confirmed.
    fn refresh_record(&mut self, record: Application) {
        let id = record.id.clone();
        if let Err(err) = self.apply(BoardMutation::Update(record)) {
            debug!(stage = "sync", application = %id, error = %err, "confirmed application no longer on the board");
        }
    }

    /// Applies a mutation and publishes the patch describing it.
    fn apply(&mut self, mutation: BoardMutation) -> Result<AppliedMutation, BoardError> {
        let kind = mutation.kind();
        let applied = self.board.apply(mutation)?;
        counter!("board_mutations_total", "kind" => kind).increment(1);

        self.version += 1;
        let version = self.version;
        let board = &self.board;
        let status = self.status.clone();
        let patch = Projector::applied(version, Utc::now(), &applied, || {
            board.snapshot(version, status)
        });
        self.events.publish(patch);
        Ok(applied)
    }

    fn spawn_backend<F>(&self, task: F) -> bool
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let Some(sender) = self.loopback.upgrade() else {
            warn!(stage = "sync", "board worker shutting down; backend call skipped");
            return false;
        };
        tokio::spawn(async move {
            let completion = task.await;
            if sender.send(BoardCommand::Completed(completion)).await.is_err() {
                warn!(stage = "sync", "board worker gone; completion dropped");
            }
        });
        true
    }

    fn begin(
        &mut self,
        kind: OperationKind,
        application: Option<ApplicationId>,
        state: SyncState,
    ) -> Uuid {
        let op_id = Uuid::new_v4();
        if self.operations.len() == OPERATION_HISTORY {
            self.operations.pop_front();
        }
        self.operations.push_back(Operation {
            op_id,
            kind,
            application,
            state,
            error: None,
            started_at: Utc::now(),
        });
        op_id
    }

    fn transition(&mut self, op_id: Uuid, state: SyncState, error: Option<String>) {
        if let Some(operation) = self.operations.iter_mut().find(|op| op.op_id == op_id) {
            operation.state = state;
            operation.error = error;
        }
    }

    fn set_operation_application(&mut self, op_id: Uuid, id: &ApplicationId) {
        if let Some(operation) = self.operations.iter_mut().find(|op| op.op_id == op_id) {
            operation.application = Some(id.clone());
        }
    }

    /// Records a failed operation. The board keeps whatever was applied locally.
    fn fail(&mut self, op_id: Uuid, message: String) -> SyncError {
        let kind = self
            .operations
            .iter()
            .find(|op| op.op_id == op_id)
            .map(|op| op.kind.as_str())
            .unwrap_or("unknown");
        let err = SyncError::ConfirmFailed {
            op: op_id,
            message: message.clone(),
        };
        error!(stage = "sync", %op_id, kind, error = %message, "backend operation failed");
        self.transition(op_id, SyncState::ConfirmFailed, Some(message));
        self.status.error = Some(err.to_string());
        err
    }

    /// Marks an operation whose backend call never started.
    fn abandon(&mut self, op_id: Uuid) {
        self.fail(op_id, SHUTTING_DOWN.to_string());
        self.publish_status();
    }

    fn start_loading(&mut self) {
        self.loading_ops += 1;
        self.status.loading = true;
        self.status.error = None;
        self.publish_status();
    }

    fn finish_loading(&mut self) {
        self.loading_ops = self.loading_ops.saturating_sub(1);
        self.status.loading = self.loading_ops > 0;
    }

    fn publish_status(&mut self) {
        gauge!("board_pending_confirmations").set(self.status.pending_confirmations as f64);
        self.version += 1;
        let patch: Patch = Projector::sync_status(self.version, Utc::now(), &self.status);
        self.events.publish(patch);
    }
}
