//! Unified error type for task storage operations.

/// Unified error type for backend operations.
///
/// Every public `Backend` method wraps substrate errors (SQL failures, lock
/// contention, I/O) into one of these variants, carrying the operation name
/// and task id where applicable so the cause is traceable across process
/// boundaries.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task {0} already exists")]
    DuplicateTask(String),

    #[error("task {task_id} is already in a terminal state ({status})")]
    AlreadyTerminal { task_id: String, status: String },

    #[error("task {task_id} is not reserved (status: {status})")]
    NotReserved { task_id: String, status: String },

    #[error("backend operation {operation:?} failed for task {task_id:?}: {source}")]
    Storage {
        operation: &'static str,
        task_id: Option<String>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("backend connection error: {0}")]
    Connection(String),
}

impl BackendError {
    pub fn storage(
        operation: &'static str,
        task_id: Option<&str>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BackendError::Storage {
            operation,
            task_id: task_id.map(str::to_string),
            source: Box::new(source),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        BackendError::storage("sqlite", None, err)
    }
}
