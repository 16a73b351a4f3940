//! In-memory task storage backend.
//!
//! Suitable for development, testing, and single-process deployments where
//! durability across restarts isn't required. Tasks live in a `HashMap`
//! behind a `RwLock`; `reserve` takes the write half for its whole
//! select-and-mutate so the lock itself is the serialization point — no
//! separate priority queue structure is needed because the table is small
//! enough to scan while held.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::BackendError;
use crate::traits::{Backend, ReservedTask, TaskRecord, TaskResult, TaskStatus};

/// Configuration for the in-memory backend.
#[derive(Debug, Clone)]
pub struct InMemoryBackendConfig {
    /// Maximum number of tasks to store (0 = unlimited).
    pub max_tasks: usize,
}

impl Default for InMemoryBackendConfig {
    fn default() -> Self {
        Self { max_tasks: 0 }
    }
}

/// In-memory backend. `Clone` is shallow — clones share the same table via
/// `Arc`.
#[derive(Clone)]
pub struct InMemoryBackend {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
    config: InMemoryBackendConfig,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_config(InMemoryBackendConfig::default())
    }

    pub fn with_config(config: InMemoryBackendConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reserved_precondition_error(task_id: &str, status: TaskStatus) -> BackendError {
    if status.is_terminal() {
        BackendError::AlreadyTerminal {
            task_id: task_id.to_string(),
            status: format!("{status:?}"),
        }
    } else {
        BackendError::NotReserved {
            task_id: task_id.to_string(),
            status: format!("{status:?}"),
        }
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn connect(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn enqueue(
        &self,
        task_id: &str,
        payload: Vec<u8>,
        available_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let mut tasks = self.tasks.write().await;

        if tasks.contains_key(task_id) {
            return Err(BackendError::DuplicateTask(task_id.to_string()));
        }

        if self.config.max_tasks > 0 && tasks.len() >= self.config.max_tasks {
            return Err(BackendError::storage(
                "enqueue",
                Some(task_id),
                std::io::Error::other("max_tasks limit reached"),
            ));
        }

        let created_at = Utc::now();
        let record = TaskRecord::new_pending(task_id, payload, available_at, created_at);
        tasks.insert(task_id.to_string(), record);
        Ok(())
    }

    async fn reserve(
        &self,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReservedTask>, BackendError> {
        if max_items == 0 {
            return Ok(Vec::new());
        }

        let mut tasks = self.tasks.write().await;

        let mut eligible: Vec<&str> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && t.available_at <= now)
            .map(|t| t.task_id.as_str())
            .collect();

        eligible.sort_by(|a, b| {
            let ta = &tasks[*a];
            let tb = &tasks[*b];
            ta.available_at
                .cmp(&tb.available_at)
                .then(ta.created_at.cmp(&tb.created_at))
        });
        eligible.truncate(max_items);
        let ids: Vec<String> = eligible.into_iter().map(str::to_string).collect();

        let mut reserved = Vec::with_capacity(ids.len());
        for id in ids {
            let record = tasks.get_mut(&id).expect("id came from the same map");
            record.status = TaskStatus::Reserved;
            record.started_at = Some(now);
            reserved.push(ReservedTask {
                task_id: record.task_id.clone(),
                payload: record.payload.clone(),
                started_at: now,
            });
        }

        Ok(reserved)
    }

    async fn mark_success(
        &self,
        task_id: &str,
        encoded_value: Vec<u8>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| BackendError::TaskNotFound(task_id.to_string()))?;

        if record.status != TaskStatus::Reserved {
            return Err(reserved_precondition_error(task_id, record.status));
        }

        record.status = TaskStatus::Success;
        record.result_value = Some(encoded_value);
        record.finished_at = Some(finished_at);
        Ok(())
    }

    async fn mark_failure(
        &self,
        task_id: &str,
        error: String,
        traceback: Option<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| BackendError::TaskNotFound(task_id.to_string()))?;

        if record.status != TaskStatus::Reserved {
            return Err(reserved_precondition_error(task_id, record.status));
        }

        record.status = TaskStatus::Failed;
        record.error_message = Some(error);
        record.traceback = traceback;
        record.finished_at = Some(finished_at);
        Ok(())
    }

    async fn get_result(&self, task_id: &str) -> Result<Option<TaskResult>, BackendError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .get(task_id)
            .and_then(TaskResult::from_record_if_terminal))
    }

    async fn recover_stuck_tasks(
        &self,
        max_age: chrono::Duration,
    ) -> Result<Vec<String>, BackendError> {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let mut recovered = Vec::new();

        for record in tasks.values_mut() {
            if record.status != TaskStatus::Reserved {
                continue;
            }
            let started_at = match record.started_at {
                Some(t) => t,
                None => continue,
            };
            if now - started_at >= max_age {
                record.status = TaskStatus::Pending;
                record.started_at = None;
                record.lease_token = None;
                recovered.push(record.task_id.clone());
            }
        }

        Ok(recovered)
    }

    async fn maintenance(&self, retention: chrono::Duration) -> Result<usize, BackendError> {
        let mut tasks = self.tasks.write().await;
        let now = Utc::now();
        let before = tasks.len();

        tasks.retain(|_, record| {
            if !record.status.is_terminal() {
                return true;
            }
            match record.finished_at {
                Some(finished_at) => now - finished_at < retention,
                None => true,
            }
        });

        Ok(before - tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_reserve_transitions_status() {
        let backend = InMemoryBackend::new();
        backend.connect().await.unwrap();
        backend
            .enqueue("t1", b"payload".to_vec(), Utc::now())
            .await
            .unwrap();

        let reserved = backend.reserve(10, Utc::now()).await.unwrap();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].task_id, "t1");

        // Not eligible a second time.
        let reserved_again = backend.reserve(10, Utc::now()).await.unwrap();
        assert!(reserved_again.is_empty());
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let backend = InMemoryBackend::new();
        backend.enqueue("dup", b"a".to_vec(), Utc::now()).await.unwrap();
        let err = backend
            .enqueue("dup", b"b".to_vec(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::DuplicateTask(_)));
    }

    #[tokio::test]
    async fn mark_success_requires_reserved_state() {
        let backend = InMemoryBackend::new();
        backend.enqueue("t1", b"payload".to_vec(), Utc::now()).await.unwrap();

        let err = backend
            .mark_success("t1", b"5".to_vec(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotReserved { .. }));
    }

    #[tokio::test]
    async fn mark_success_twice_fails_second_time() {
        let backend = InMemoryBackend::new();
        backend.enqueue("t1", b"payload".to_vec(), Utc::now()).await.unwrap();
        backend.reserve(1, Utc::now()).await.unwrap();
        backend.mark_success("t1", b"5".to_vec(), Utc::now()).await.unwrap();

        let err = backend
            .mark_success("t1", b"6".to_vec(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyTerminal { .. }));
    }

    #[tokio::test]
    async fn get_result_is_none_until_terminal() {
        let backend = InMemoryBackend::new();
        backend.enqueue("t1", b"payload".to_vec(), Utc::now()).await.unwrap();
        assert!(backend.get_result("t1").await.unwrap().is_none());

        backend.reserve(1, Utc::now()).await.unwrap();
        assert!(backend.get_result("t1").await.unwrap().is_none());

        backend.mark_success("t1", b"5".to_vec(), Utc::now()).await.unwrap();
        let result = backend.get_result("t1").await.unwrap().unwrap();
        assert_eq!(result.status, TaskStatus::Success);
        assert_eq!(result.value, Some(b"5".to_vec()));
    }

    #[tokio::test]
    async fn eligibility_honors_available_at() {
        let backend = InMemoryBackend::new();
        let now = Utc::now();
        let future = now + chrono::Duration::seconds(60);
        backend.enqueue("future", b"x".to_vec(), future).await.unwrap();

        let reserved = backend.reserve(10, now).await.unwrap();
        assert!(reserved.is_empty());

        let reserved = backend.reserve(10, future).await.unwrap();
        assert_eq!(reserved.len(), 1);
    }

    #[tokio::test]
    async fn recover_stuck_tasks_reverts_to_pending() {
        let backend = InMemoryBackend::new();
        backend.enqueue("t1", b"payload".to_vec(), Utc::now()).await.unwrap();
        backend.reserve(1, Utc::now()).await.unwrap();

        let recovered = backend
            .recover_stuck_tasks(chrono::Duration::seconds(-1))
            .await
            .unwrap();
        assert_eq!(recovered, vec!["t1".to_string()]);

        // Eligible again.
        let reserved = backend.reserve(1, Utc::now()).await.unwrap();
        assert_eq!(reserved.len(), 1);
    }
}
