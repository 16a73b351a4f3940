//! Core backend trait and supporting data models.
//!
//! Defines the `Backend` trait and the types that flow across it, persisted
//! identically whether the substrate is in-memory or SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Lifecycle state of a persisted task. Transitions monotonically
/// `Pending -> Reserved -> (Success | Failed)`, with the single exception of
/// `recover_stuck_tasks` reverting an abandoned `Reserved` row back to
/// `Pending` (never to a terminal state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Reserved,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

/// Identifies the worker holding a reservation, and when that reservation
/// should be considered abandoned. Populated by the Worker, consulted only
/// by `recover_stuck_tasks` — the reservation protocol itself never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseToken {
    pub worker_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Persisted task row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub payload: Vec<u8>,
    pub status: TaskStatus,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result_value: Option<Vec<u8>>,
    pub error_message: Option<String>,
    pub traceback: Option<String>,
    pub lease_token: Option<LeaseToken>,
    /// Present for forward compatibility with an operator-supplied retry
    /// scheduler. No core code path reads or writes these past their default.
    pub retry_count: u32,
    pub max_retries: u32,
}

impl TaskRecord {
    /// Build a fresh `Pending` row as `Backend::enqueue` sees it.
    pub fn new_pending(
        task_id: impl Into<String>,
        payload: Vec<u8>,
        available_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            payload,
            status: TaskStatus::Pending,
            available_at,
            created_at,
            started_at: None,
            finished_at: None,
            result_value: None,
            error_message: None,
            traceback: None,
            lease_token: None,
            retry_count: 0,
            max_retries: 0,
        }
    }
}

/// What the Backend hands a worker on a successful reservation — the
/// transient, decode-ready view of a row, not the full persisted record.
#[derive(Debug, Clone)]
pub struct ReservedTask {
    pub task_id: String,
    pub payload: Vec<u8>,
    pub started_at: DateTime<Utc>,
}

/// Public read model returned by `get_result` and, after decoding, by the
/// producer-facing `TaskQueue::get_result`.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub value: Option<Vec<u8>>,
    pub error: Option<String>,
    pub traceback: Option<String>,
    pub enqueued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskResult {
    fn from_record(record: &TaskRecord) -> Option<Self> {
        match record.status {
            TaskStatus::Success => Some(TaskResult {
                task_id: record.task_id.clone(),
                status: TaskStatus::Success,
                value: record.result_value.clone(),
                error: None,
                traceback: None,
                enqueued_at: Some(record.created_at),
                started_at: record.started_at,
                finished_at: record.finished_at,
            }),
            TaskStatus::Failed => Some(TaskResult {
                task_id: record.task_id.clone(),
                status: TaskStatus::Failed,
                value: None,
                error: record.error_message.clone(),
                traceback: record.traceback.clone(),
                enqueued_at: Some(record.created_at),
                started_at: record.started_at,
                finished_at: record.finished_at,
            }),
            TaskStatus::Pending | TaskStatus::Reserved => None,
        }
    }

    /// Build the public read model from a row, returning `None` for rows
    /// that are absent or non-terminal — the same contract `get_result` must
    /// uphold regardless of substrate.
    pub fn from_record_if_terminal(record: &TaskRecord) -> Option<Self> {
        Self::from_record(record)
    }
}

/// Core trait every storage substrate must satisfy.
///
/// Implementations must be `Send + Sync` for use across async contexts and
/// across worker processes sharing one backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable name of the storage backend (e.g. "in-memory", "sqlite").
    fn backend_name(&self) -> &'static str;

    /// Idempotent: create schema if absent, run lightweight migrations.
    async fn connect(&self) -> Result<(), BackendError>;

    /// Idempotent: release any held resources (connections, background tasks).
    async fn close(&self) -> Result<(), BackendError>;

    /// Persist a new row with `status = Pending`.
    async fn enqueue(
        &self,
        task_id: &str,
        payload: Vec<u8>,
        available_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;

    /// Atomically select up to `max_items` eligible rows, transition them to
    /// `Reserved`, and return them. Ordered by ascending `available_at`, ties
    /// broken by ascending `created_at`. Two concurrent calls never return
    /// overlapping sets.
    async fn reserve(
        &self,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservedTask>, BackendError>;

    /// Transition `Reserved -> Success`, storing the encoded value.
    async fn mark_success(
        &self,
        task_id: &str,
        encoded_value: Vec<u8>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;

    /// Transition `Reserved -> Failed`, storing the diagnostics.
    async fn mark_failure(
        &self,
        task_id: &str,
        error: String,
        traceback: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError>;

    /// Returns the terminal row when present, `None` when absent or
    /// non-terminal. Never blocks.
    async fn get_result(&self, task_id: &str) -> Result<Option<TaskResult>, BackendError>;

    /// Revert any `Reserved` row whose `started_at` is older than `max_age`
    /// back to `Pending`, clearing `started_at`. Returns the affected ids.
    /// Nothing calls this automatically; it exists for a supervisory process
    /// to invoke on startup (see `DESIGN.md`, Open Question 1).
    async fn recover_stuck_tasks(
        &self,
        max_age: chrono::Duration,
    ) -> Result<Vec<String>, BackendError>;

    /// Ambient retention hook: prune terminal rows older than `retention`.
    /// The policy of whether/when to call this is an operator concern.
    async fn maintenance(&self, retention: chrono::Duration) -> Result<usize, BackendError>;
}
