//! Polling worker: reserves tasks, dispatches them through a `JobRegistry`,
//! and records their outcome. In-flight job count is bounded by
//! `WorkerConfig::max_concurrency`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use futures::FutureExt;
use sitq_backend::{Backend, ReservedTask};
use sitq_codec::{Codec, Envelope, JobError, JobRegistry, JsonCodec};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::WorkerError;

/// Configuration for a [`Worker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of jobs executing concurrently. Must be at least 1.
    pub max_concurrency: usize,
    /// Maximum number of tasks reserved in a single `reserve` call. Never
    /// exceeds the currently free concurrency slots regardless of this value.
    /// `0` (the default) means "use `max_concurrency`".
    pub batch_size: usize,
    /// How long to sleep between reservation attempts when nothing is eligible.
    pub poll_interval: StdDuration,
    /// How long to sleep after a backend error before retrying.
    pub error_backoff: StdDuration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            batch_size: 0,
            poll_interval: StdDuration::from_secs(1),
            error_backoff: StdDuration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// `batch_size` with the `0` ("use `max_concurrency`") sentinel resolved.
    fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            self.max_concurrency
        } else {
            self.batch_size
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: StdDuration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_error_backoff(mut self, error_backoff: StdDuration) -> Self {
        self.error_backoff = error_backoff;
        self
    }
}

/// Polls a [`Backend`] for eligible tasks and executes them through a
/// [`JobRegistry`].
pub struct Worker {
    backend: Arc<dyn Backend>,
    registry: Arc<JobRegistry>,
    config: WorkerConfig,
    codec: JsonCodec,
    shutdown: CancellationToken,
    running_tx: watch::Sender<bool>,
}

impl Worker {
    pub fn new(
        backend: Arc<dyn Backend>,
        registry: Arc<JobRegistry>,
        config: WorkerConfig,
    ) -> Result<Self, WorkerError> {
        if config.max_concurrency == 0 {
            return Err(WorkerError::Configuration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        let (running_tx, _) = watch::channel(false);

        Ok(Self {
            backend,
            registry,
            config,
            codec: JsonCodec::default(),
            shutdown: CancellationToken::new(),
            running_tx,
        })
    }

    /// Enter the polling loop. Returns once `stop` has been observed and all
    /// in-flight jobs have drained.
    pub async fn start(&self) -> Result<(), WorkerError> {
        if *self.running_tx.borrow() {
            return Err(WorkerError::AlreadyRunning);
        }
        self.running_tx.send_replace(true);

        info!(
            max_concurrency = self.config.max_concurrency,
            "worker starting"
        );
        self.backend.connect().await?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut in_flight = JoinSet::new();

        while !self.shutdown.is_cancelled() {
            // Reap finished jobs first so their slots are visible below.
            while in_flight.try_join_next().is_some() {}

            let free = self.config.max_concurrency.saturating_sub(in_flight.len());
            if free == 0 {
                tokio::select! {
                    _ = in_flight.join_next() => {}
                    _ = self.shutdown.cancelled() => {}
                }
                continue;
            }

            let now = Utc::now();
            let to_reserve = self.config.effective_batch_size().min(free);
            match self.backend.reserve(to_reserve, now).await {
                Ok(reserved) if !reserved.is_empty() => {
                    debug!(count = reserved.len(), "reserved tasks");
                    for task in reserved {
                        let permit = tokio::select! {
                            permit = semaphore.clone().acquire_owned() => {
                                permit.expect("semaphore is never closed")
                            }
                            _ = self.shutdown.cancelled() => break,
                        };
                        let backend = self.backend.clone();
                        let registry = self.registry.clone();
                        let codec = self.codec;
                        in_flight.spawn(async move {
                            let _permit = permit;
                            execute_task(backend.as_ref(), registry.as_ref(), &codec, task).await;
                        });
                    }
                }
                Ok(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = self.shutdown.cancelled() => {}
                    }
                }
                Err(e) => {
                    error!(error = %e, "reserve failed, backing off");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }

        info!(in_flight = in_flight.len(), "draining in-flight jobs");
        while in_flight.join_next().await.is_some() {}

        self.backend.close().await?;
        self.running_tx.send_replace(false);
        info!("worker stopped");
        Ok(())
    }

    /// Signal the worker to stop and wait for it to finish draining.
    /// No-op if the worker isn't running.
    pub async fn stop(&self) {
        if !*self.running_tx.borrow() {
            return;
        }
        self.shutdown.cancel();

        let mut rx = self.running_tx.subscribe();
        while *rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

async fn execute_task(
    backend: &dyn Backend,
    registry: &JobRegistry,
    codec: &JsonCodec,
    task: ReservedTask,
) {
    let task_id = task.task_id.clone();
    let outcome = decode_and_run(registry, codec, &task.payload).await;
    let finished_at = Utc::now();

    match outcome {
        Ok(value) => match codec.encode(&value) {
            Ok(bytes) => {
                if let Err(e) = backend.mark_success(&task_id, bytes, finished_at).await {
                    error!(task_id = %task_id, error = %e, "failed to record task success");
                } else {
                    info!(task_id = %task_id, "task succeeded");
                }
            }
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "failed to encode task output, recording as failure");
                let _ = backend
                    .mark_failure(&task_id, e.to_string(), None, finished_at)
                    .await;
            }
        },
        Err(job_error) => {
            warn!(task_id = %task_id, error = %job_error.message, "task failed");
            if let Err(e) = backend
                .mark_failure(
                    &task_id,
                    job_error.message,
                    job_error.traceback,
                    finished_at,
                )
                .await
            {
                error!(task_id = %task_id, error = %e, "failed to record task failure");
            }
        }
    }
}

/// Decode the envelope and run the job, converting a panic in the job body
/// into a `JobError` instead of unwinding the worker's task.
async fn decode_and_run(
    registry: &JobRegistry,
    codec: &JsonCodec,
    payload: &[u8],
) -> Result<serde_json::Value, JobError> {
    let envelope: Envelope = codec
        .decode(payload)
        .map_err(|e| JobError::new(format!("failed to decode task envelope: {e}")))?;

    match AssertUnwindSafe(registry.dispatch(&envelope.job_name, envelope.args))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(JobError::new(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
