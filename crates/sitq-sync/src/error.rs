//! Errors raised by the blocking façade.

use sitq_core::TaskQueueError;

/// Raised when a [`crate::SyncTaskQueue`] is constructed or used in a way its
/// threading model cannot support.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error(
        "SyncTaskQueue cannot be constructed from within a running Tokio runtime; \
         use sitq_core::TaskQueue directly in async contexts"
    )]
    RunningInsideTokioRuntime,
}

/// Raised when bridging a blocking call onto the façade's dedicated runtime
/// thread fails — as opposed to the operation itself returning a
/// domain-level error, which is wrapped in [`SyncError::Operation`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Operation(#[from] TaskQueueError),

    #[error(transparent)]
    TaskFailed(#[from] TaskExecutionError),

    #[error("the façade's runtime thread dropped its response channel")]
    RuntimeThreadGone,
}

/// Raised by [`crate::SyncTaskQueue::get_result`] when the task it polled for
/// resolved to a failure, promoting the persisted failure into an idiomatic
/// blocking-call error rather than a silent `TaskResult { status: Failed }`.
#[derive(Debug, thiserror::Error)]
#[error("task {task_id} failed: {message}")]
pub struct TaskExecutionError {
    pub task_id: String,
    pub message: String,
    pub traceback: Option<String>,
}
