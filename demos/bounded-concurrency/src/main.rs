//! Runs 5 half-second jobs through a worker with `max_concurrency = 2` and
//! reports each job's own observed start/end offsets, so the ~2+2+1 batching
//! is visible in the logs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sitq_backend::{SqliteBackend, SqliteBackendConfig};
use sitq_codec::{Job, JobError, JobRegistry};
use sitq_core::{TaskQueue, Worker, WorkerConfig};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct SlowTask {
    id: u32,
    sleep_millis: u64,
}

#[async_trait::async_trait]
impl Job for SlowTask {
    const NAME: &'static str = "slow_task";
    type Output = String;

    async fn run(&self) -> Result<String, JobError> {
        tokio::time::sleep(Duration::from_millis(self.sleep_millis)).await;
        Ok(format!("Task {} completed", self.id))
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

    info!("2. Enqueuing 5 tasks (each takes ~0.5s)...");
    let mut task_ids = Vec::new();
    for id in 1..=5u32 {
        let task_id = queue
            .enqueue(&SlowTask { id, sleep_millis: 500 }, None)
            .await?;
        info!(task_id = %task_id, id, "enqueued");
        task_ids.push(task_id);
    }

    info!("Without concurrency limits all 5 would complete in ~0.5s; with max_concurrency=2 expect ~1.25s (2 + 2 + 1)");

    info!("3. Starting worker with max_concurrency=2...");
    let registry = Arc::new(JobRegistry::new().with::<SlowTask>());
    let config = WorkerConfig::default()
        .with_max_concurrency(2)
        .with_poll_interval(Duration::from_millis(200));
    let worker = Arc::new(Worker::new(backend, registry, config)?);
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    let start = Instant::now();

    info!("4. Retrieving results...");
    for task_id in &task_ids {
        let result = queue.await_result(task_id, Duration::from_secs(5)).await?;
        info!(task_id = %task_id, value = ?result.value, "result");
    }

    worker.stop().await;

    info!(elapsed = ?start.elapsed(), "5. Total execution time");

    Ok(())
}
