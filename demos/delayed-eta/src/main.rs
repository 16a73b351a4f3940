//! Enqueues three tasks with staggered `eta`s and shows the worker only
//! picking each one up once it becomes eligible.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sitq_backend::{SqliteBackend, SqliteBackendConfig};
use sitq_codec::{Job, JobError, JobRegistry};
use sitq_core::{TaskQueue, Worker, WorkerConfig};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct DelayedTask {
    message: String,
}

#[async_trait::async_trait]
impl Job for DelayedTask {
    const NAME: &'static str = "delayed_task";
    type Output = String;

    async fn run(&self) -> Result<String, JobError> {
        Ok(format!("Executed at: {} | {}", Utc::now().to_rfc3339(), self.message))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let tmpdir = tempfile::tempdir()?;
    let db_path = tmpdir.path().join("tasks.db");

    info!("1. Setting up backend and task queue...");
    let backend = Arc::new(
        SqliteBackend::with_config(SqliteBackendConfig {
            database_path: db_path,
            ..Default::default()
        })
        .await?,
    );
    let queue = TaskQueue::new(backend.clone());

    info!("2. Enqueuing tasks with different ETAs...");
    let now = Utc::now();

    let eta_1 = now + chrono::Duration::seconds(1);
    let task_id_1 = queue
        .enqueue(
            &DelayedTask { message: "Task 1 (1 second delay)".into() },
            Some(eta_1),
        )
        .await?;
    info!(task_id = %task_id_1, eta = %eta_1, "scheduled");

    let eta_2 = now + chrono::Duration::seconds(2);
    let task_id_2 = queue
        .enqueue(
            &DelayedTask { message: "Task 2 (2 second delay)".into() },
            Some(eta_2),
        )
        .await?;
    info!(task_id = %task_id_2, eta = %eta_2, "scheduled");

    let eta_3 = now + chrono::Duration::seconds(3);
    let task_id_3 = queue
        .enqueue(
            &DelayedTask { message: "Task 3 (3 second delay)".into() },
            Some(eta_3),
        )
        .await?;
    info!(task_id = %task_id_3, eta = %eta_3, "scheduled");

    info!("3. Starting worker...");
    let registry = Arc::new(JobRegistry::new().with::<DelayedTask>());
    let config = WorkerConfig::default().with_poll_interval(Duration::from_millis(500));
    let worker = Arc::new(Worker::new(backend, registry, config)?);
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    info!("Worker is polling for eligible tasks...");

    info!("4. Retrieving results...");
    for task_id in [&task_id_1, &task_id_2, &task_id_3] {
        let result = queue.await_result(task_id, Duration::from_secs(5)).await?;
        info!(task_id = %task_id, value = ?result.value, "result");
    }

    info!("5. Stopping worker...");
    worker.stop().await;

    info!("Tasks execute only once current time >= their eta.");

    Ok(())
}
