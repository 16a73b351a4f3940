//! Shared parity assertions for backend implementations.
//!
//! Each test function takes a `&dyn Backend` so the same assertions apply to
//! `InMemoryBackend` and `SqliteBackend`. The bottom of the file runs every
//! function against both backends.

use chrono::{Duration, Utc};
use sitq_backend::prelude::*;
use std::collections::HashSet;

async fn basic_lifecycle(backend: &dyn Backend) {
    backend.connect().await.unwrap();

    backend
        .enqueue("lifecycle-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();

    assert!(backend.get_result("lifecycle-1").await.unwrap().is_none());

    let reserved = backend.reserve(10, Utc::now()).await.unwrap();
    assert_eq!(reserved.len(), 1);
    assert_eq!(reserved[0].task_id, "lifecycle-1");

    assert!(backend.get_result("lifecycle-1").await.unwrap().is_none());

    backend
        .mark_success("lifecycle-1", b"42".to_vec(), Utc::now())
        .await
        .unwrap();

    let result = backend.get_result("lifecycle-1").await.unwrap().unwrap();
    assert_eq!(result.status, TaskStatus::Success);
    assert_eq!(result.value, Some(b"42".to_vec()));
    assert!(result.finished_at.is_some());
}

async fn failure_lifecycle(backend: &dyn Backend) {
    backend
        .enqueue("failure-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();
    backend.reserve(10, Utc::now()).await.unwrap();

    backend
        .mark_failure(
            "failure-1",
            "boom".to_string(),
            Some("traceback here".to_string()),
            Utc::now(),
        )
        .await
        .unwrap();

    let result = backend.get_result("failure-1").await.unwrap().unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("boom"));
    assert_eq!(result.traceback.as_deref(), Some("traceback here"));
}

/// Invariant 1 (§8): reservation exclusivity under concurrent callers.
async fn reservation_exclusivity(backend: &dyn Backend) {
    let n = 20;
    for i in 0..n {
        backend
            .enqueue(&format!("excl-{i}"), b"{}".to_vec(), Utc::now())
            .await
            .unwrap();
    }

    let now = Utc::now();
    let mut futures = Vec::new();
    for _ in 0..4 {
        futures.push(backend.reserve(n, now));
    }
    let results = futures::future::join_all(futures).await;

    let mut seen = HashSet::new();
    let mut total = 0;
    for reserved in results {
        let reserved = reserved.unwrap();
        for task in &reserved {
            assert!(seen.insert(task.task_id.clone()), "task reserved twice");
            total += 1;
        }
    }
    assert_eq!(total, n);
    assert_eq!(seen.len(), n);
}

/// Invariant 4 (§8): a task is never reserved before its `available_at`.
async fn eligibility_honoring(backend: &dyn Backend) {
    let now = Utc::now();
    let eta = now + Duration::seconds(30);
    backend
        .enqueue("delayed-1", b"{}".to_vec(), eta)
        .await
        .unwrap();

    assert!(backend.reserve(10, now).await.unwrap().is_empty());
    let reserved = backend.reserve(10, eta).await.unwrap();
    assert_eq!(reserved.len(), 1);
}

/// Ordering: ascending `available_at`, ties broken by ascending `created_at`.
async fn reservation_ordering(backend: &dyn Backend) {
    let base = Utc::now();
    backend
        .enqueue("order-late", b"{}".to_vec(), base + Duration::seconds(5))
        .await
        .unwrap();
    backend.enqueue("order-early", b"{}".to_vec(), base).await.unwrap();

    let reserved = backend
        .reserve(10, base + Duration::seconds(10))
        .await
        .unwrap();
    let ids: Vec<&str> = reserved.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(ids, vec!["order-early", "order-late"]);
}

async fn mark_success_requires_reservation(backend: &dyn Backend) {
    backend
        .enqueue("not-reserved-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();

    let err = backend
        .mark_success("not-reserved-1", b"1".to_vec(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotReserved { .. }));
}

async fn mark_success_on_terminal_row_errors(backend: &dyn Backend) {
    backend
        .enqueue("terminal-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();
    backend.reserve(10, Utc::now()).await.unwrap();
    backend
        .mark_success("terminal-1", b"1".to_vec(), Utc::now())
        .await
        .unwrap();

    let err = backend
        .mark_success("terminal-1", b"2".to_vec(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::AlreadyTerminal { .. }));
}

async fn duplicate_task_id_rejected(backend: &dyn Backend) {
    backend
        .enqueue("dup-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();
    let err = backend
        .enqueue("dup-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::DuplicateTask(_)));
}

async fn recover_stuck_tasks_reverts_abandoned_reservations(backend: &dyn Backend) {
    backend
        .enqueue("stuck-1", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();
    backend.reserve(10, Utc::now()).await.unwrap();

    // Not yet old enough.
    let recovered = backend
        .recover_stuck_tasks(Duration::seconds(300))
        .await
        .unwrap();
    assert!(recovered.is_empty());

    let recovered = backend
        .recover_stuck_tasks(Duration::seconds(-1))
        .await
        .unwrap();
    assert_eq!(recovered, vec!["stuck-1".to_string()]);

    let reserved = backend.reserve(10, Utc::now()).await.unwrap();
    assert_eq!(reserved.len(), 1);
}

async fn maintenance_prunes_old_terminal_rows_only(backend: &dyn Backend) {
    backend
        .enqueue("prune-old", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();
    backend.reserve(10, Utc::now()).await.unwrap();
    backend
        .mark_success("prune-old", b"1".to_vec(), Utc::now() - Duration::days(2))
        .await
        .unwrap();

    backend
        .enqueue("prune-keep-pending", b"{}".to_vec(), Utc::now())
        .await
        .unwrap();

    let pruned = backend.maintenance(Duration::hours(1)).await.unwrap();
    assert_eq!(pruned, 1);

    assert!(backend.get_result("prune-old").await.unwrap().is_none());
    // Pending row survives regardless of age.
    backend.reserve(10, Utc::now()).await.unwrap();
}

macro_rules! parity_suite {
    ($backend_ctor:expr) => {
        basic_lifecycle(&$backend_ctor().await).await;
        failure_lifecycle(&$backend_ctor().await).await;
        reservation_exclusivity(&$backend_ctor().await).await;
        eligibility_honoring(&$backend_ctor().await).await;
        reservation_ordering(&$backend_ctor().await).await;
        mark_success_requires_reservation(&$backend_ctor().await).await;
        mark_success_on_terminal_row_errors(&$backend_ctor().await).await;
        duplicate_task_id_rejected(&$backend_ctor().await).await;
        recover_stuck_tasks_reverts_abandoned_reservations(&$backend_ctor().await).await;
        maintenance_prunes_old_terminal_rows_only(&$backend_ctor().await).await;
    };
}

#[tokio::test]
async fn in_memory_backend_parity() {
    async fn make() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.connect().await.unwrap();
        backend
    }
    parity_suite!(make);
}

#[tokio::test]
async fn sqlite_backend_parity() {
    async fn make() -> SqliteBackend {
        SqliteBackend::with_config(SqliteBackendConfig {
            database_path: ":memory:".into(),
            ..Default::default()
        })
        .await
        .unwrap()
    }
    parity_suite!(make);
}
