//! Error types crossing the producer and worker surfaces.

use sitq_backend::BackendError;
use sitq_codec::{DecodeError, EncodeError};

/// Raised when a caller passes a bad argument to the producer surface.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{parameter} must not be empty")]
    Empty { parameter: &'static str },
}

/// Errors from the producer-facing `TaskQueue`.
#[derive(Debug, thiserror::Error)]
pub enum TaskQueueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("backend operation failed for task {task_id:?}: {source}")]
    Backend {
        task_id: Option<String>,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl TaskQueueError {
    pub fn backend(task_id: Option<&str>, source: BackendError) -> Self {
        TaskQueueError::Backend {
            task_id: task_id.map(str::to_string),
            source,
        }
    }
}

/// Raised when `TaskQueue::get_result` elapses its timeout.
#[derive(Debug, thiserror::Error)]
#[error("timed out after {timeout_secs}s waiting for task {task_id}")]
pub struct TimeoutError {
    pub task_id: String,
    pub timeout_secs: u64,
}

/// Errors surfaced from the `Worker` loop itself, not from individual jobs —
/// a job failure always becomes a persisted `TaskResult`, never this type.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker misconfigured: {0}")]
    Configuration(String),

    #[error("backend operation failed: {0}")]
    Backend(#[from] BackendError),

    #[error("worker is already running")]
    AlreadyRunning,
}
