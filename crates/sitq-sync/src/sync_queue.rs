//! Blocking wrapper around [`sitq_core::TaskQueue`] for use from threads with
//! no running Tokio runtime (plain `fn main`, a thread spawned by a
//! non-async framework, a Python-style script entry point).
//!
//! A dedicated OS thread owns a current-thread Tokio runtime and the
//! `TaskQueue` built on it; the calling thread submits work over an
//! `mpsc` channel and blocks on a `oneshot` reply, mirroring the
//! thread-plus-private-event-loop shape without needing an `asyncio`-style
//! `run_coroutine_threadsafe` bridge.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use sitq_backend::Backend;
use sitq_codec::Job;
use sitq_core::{TaskQueue, TaskResult};
use tokio::sync::{mpsc, oneshot};

use crate::error::{ConfigurationError, SyncError, TaskExecutionError};

enum Command {
    Enqueue {
        job_name: &'static str,
        envelope_job: Box<dyn FnOnce(&TaskQueue) -> EnqueueFuture + Send>,
        reply: oneshot::Sender<Result<String, SyncError>>,
    },
    GetResult {
        task_id: String,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<Option<TaskResult>, SyncError>>,
    },
    Close {
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
}

type EnqueueFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, SyncError>> + Send>>;

/// Blocking task queue façade. Construct one per calling thread; it owns its
/// runtime thread for its entire lifetime and shuts it down on drop.
pub struct SyncTaskQueue {
    command_tx: Option<mpsc::UnboundedSender<Command>>,
    runtime_thread: Option<JoinHandle<()>>,
}

impl SyncTaskQueue {
    /// Start the façade's runtime thread against `backend`.
    ///
    /// Fails with [`ConfigurationError::RunningInsideTokioRuntime`] if called
    /// from a thread that already has a Tokio runtime entered — using this
    /// façade there would deadlock the calling runtime's executor.
    pub fn new(backend: Arc<dyn Backend>) -> Result<Self, ConfigurationError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ConfigurationError::RunningInsideTokioRuntime);
        }

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<Command>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();

        let runtime_thread = std::thread::Builder::new()
            .name("sitq-sync-runtime".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build current-thread runtime for SyncTaskQueue");

                runtime.block_on(async move {
                    let queue = TaskQueue::new(backend);
                    let _ = ready_tx.send(());

                    while let Some(command) = command_rx.recv().await {
                        match command {
                            Command::Enqueue {
                                envelope_job,
                                reply,
                                ..
                            } => {
                                let result = envelope_job(&queue).await;
                                let _ = reply.send(result);
                            }
                            Command::GetResult {
                                task_id,
                                timeout,
                                reply,
                            } => {
                                let result = queue
                                    .get_result(&task_id, timeout)
                                    .await
                                    .map_err(SyncError::from);
                                let _ = reply.send(result);
                            }
                            Command::Close { reply } => {
                                let result = queue.close().await.map_err(SyncError::from);
                                let _ = reply.send(result);
                            }
                        }
                    }
                });
            })
            .expect("failed to spawn SyncTaskQueue runtime thread");

        // Block until the runtime thread's TaskQueue is constructed, so an
        // immediate `enqueue` call never races queue construction.
        let _ = ready_rx.recv();

        Ok(Self {
            command_tx: Some(command_tx),
            runtime_thread: Some(runtime_thread),
        })
    }

    fn send(&self, command: Command) -> Result<(), SyncError> {
        self.command_tx
            .as_ref()
            .expect("command_tx is only taken in Drop")
            .send(command)
            .map_err(|_| SyncError::RuntimeThreadGone)
    }

    /// Enqueue a job, optionally delayed until `eta`. Blocks the calling
    /// thread until the backend has durably recorded it.
    pub fn enqueue<J: Job>(
        &self,
        job: J,
        eta: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<String, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope_job: Box<dyn FnOnce(&TaskQueue) -> EnqueueFuture + Send> =
            Box::new(move |queue: &TaskQueue| {
                let queue = queue.clone();
                Box::pin(async move { queue.enqueue(&job, eta).await.map_err(SyncError::from) })
            });

        self.send(Command::Enqueue {
            job_name: J::NAME,
            envelope_job,
            reply: reply_tx,
        })?;

        reply_rx
            .blocking_recv()
            .map_err(|_| SyncError::RuntimeThreadGone)?
    }

    /// Poll for a task's terminal result, blocking the calling thread up to
    /// `timeout` (forever when `None`). A persisted failure is promoted to a
    /// raised [`TaskExecutionError`] rather than an `Ok` result.
    pub fn get_result(
        &self,
        task_id: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<serde_json::Value>, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::GetResult {
            task_id: task_id.to_string(),
            timeout,
            reply: reply_tx,
        })?;

        let result = reply_rx
            .blocking_recv()
            .map_err(|_| SyncError::RuntimeThreadGone)??;

        match result {
            None => Ok(None),
            Some(TaskResult {
                status: sitq_backend::TaskStatus::Success,
                value,
                ..
            }) => Ok(value),
            Some(TaskResult {
                status: sitq_backend::TaskStatus::Failed,
                error,
                traceback,
                task_id,
                ..
            }) => Err(SyncError::TaskFailed(TaskExecutionError {
                task_id,
                message: error.unwrap_or_default(),
                traceback,
            })),
            Some(_) => unreachable!("get_result never returns a non-terminal status"),
        }
    }

    pub fn close(&self) -> Result<(), SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Close { reply: reply_tx })?;
        reply_rx
            .blocking_recv()
            .map_err(|_| SyncError::RuntimeThreadGone)?
    }
}

impl Drop for SyncTaskQueue {
    fn drop(&mut self) {
        // Drop the sender first so the runtime thread's command loop sees
        // the channel close and exits, then join it.
        self.command_tx.take();
        if let Some(thread) = self.runtime_thread.take() {
            let _ = thread.join();
        }
    }
}
