//! Producer-facing task queue: enqueue jobs, poll for results.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use sitq_backend::{Backend, TaskStatus};
use sitq_codec::{encode_job, Codec, Envelope, Job, JsonCodec};
use tracing::{debug, instrument};

use crate::error::{TaskQueueError, TimeoutError, ValidationError};

/// How often `get_result` repolls the backend while waiting.
const POLL_INTERVAL: StdDuration = StdDuration::from_millis(500);

/// Public read model returned by [`TaskQueue::get_result`]. The `value` is
/// decoded JSON, not raw bytes — callers that need a concrete type deserialize
/// it themselves via `serde_json::from_value`.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub value: Option<serde_json::Value>,
    pub error: Option<String>,
    pub traceback: Option<String>,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    fn from_backend(
        backend_result: sitq_backend::TaskResult,
        codec: &JsonCodec,
    ) -> Result<Self, TaskQueueError> {
        let value = backend_result
            .value
            .as_deref()
            .map(|bytes| codec.decode::<serde_json::Value>(bytes))
            .transpose()?;

        Ok(TaskResult {
            task_id: backend_result.task_id,
            status: backend_result.status,
            value,
            error: backend_result.error,
            traceback: backend_result.traceback,
            enqueued_at: backend_result.enqueued_at,
            started_at: backend_result.started_at,
            finished_at: backend_result.finished_at,
        })
    }
}

/// Async producer API: enqueue jobs for a worker to pick up, retrieve results.
///
/// Cloning shares the same backend handle — cheap, intended for use from
/// multiple tasks within one process.
#[derive(Clone)]
pub struct TaskQueue {
    backend: Arc<dyn Backend>,
    codec: JsonCodec,
}

impl TaskQueue {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            codec: JsonCodec::default(),
        }
    }

    /// Enqueue a job, optionally delayed until `eta`. Returns the assigned
    /// task id.
    #[instrument(skip(self, job), fields(job_name = J::NAME))]
    pub async fn enqueue<J: Job>(
        &self,
        job: &J,
        eta: Option<DateTime<Utc>>,
    ) -> Result<String, TaskQueueError> {
        let (job_name, args) = encode_job(job)?;
        let envelope = Envelope { job_name, args };
        let payload = self.codec.encode(&envelope)?;

        let task_id = uuid::Uuid::now_v7().to_string();
        let available_at = eta.unwrap_or_else(Utc::now);

        self.backend
            .enqueue(&task_id, payload, available_at)
            .await
            .map_err(|e| TaskQueueError::backend(Some(&task_id), e))?;

        debug!(task_id = %task_id, "enqueued task");
        Ok(task_id)
    }

    /// Poll for a task's terminal result, waiting up to `timeout` (waits
    /// forever when `None`). Returns `Ok(None)` on timeout elapsing.
    pub async fn get_result(
        &self,
        task_id: &str,
        timeout: Option<StdDuration>,
    ) -> Result<Option<TaskResult>, TaskQueueError> {
        if task_id.is_empty() {
            return Err(ValidationError::Empty { parameter: "task_id" }.into());
        }

        let start = tokio::time::Instant::now();

        loop {
            let record = self
                .backend
                .get_result(task_id)
                .await
                .map_err(|e| TaskQueueError::backend(Some(task_id), e))?;

            if let Some(record) = record {
                return Ok(Some(TaskResult::from_backend(record, &self.codec)?));
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    return Ok(None);
                }
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for a task's terminal result, returning a [`TimeoutError`] on
    /// elapsing rather than `Ok(None)`. Convenience over `get_result` for
    /// callers that treat a timeout as exceptional.
    pub async fn await_result(
        &self,
        task_id: &str,
        timeout: StdDuration,
    ) -> Result<TaskResult, TaskQueueError> {
        self.get_result(task_id, Some(timeout))
            .await?
            .ok_or_else(|| {
                TaskQueueError::Timeout(TimeoutError {
                    task_id: task_id.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            })
    }

    pub async fn close(&self) -> Result<(), TaskQueueError> {
        self.backend
            .close()
            .await
            .map_err(|e| TaskQueueError::backend(None, e))
    }
}
