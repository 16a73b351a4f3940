//! End-to-end walkthrough: SQLite backend, two job types, a worker, and
//! result retrieval, with a clean shutdown at the end.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitq_backend::{SqliteBackend, SqliteBackendConfig};
use sitq_codec::{Job, JobError, JobRegistry};
use sitq_core::{TaskQueue, Worker, WorkerConfig};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct SayHello {
    name: String,
}

#[async_trait::async_trait]
impl Job for SayHello {
    const NAME: &'static str = "say_hello";
    type Output = String;

    async fn run(&self) -> Result<String, JobError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(format!("Hello, {}!", self.name))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AddNumbers {
    a: i64,
    b: i64,
}

#[async_trait::async_trait]
impl Job for AddNumbers {
    const NAME: &'static str = "add_numbers";
    type Output = i64;

    async fn run(&self) -> Result<i64, JobError> {
        Ok(self.a + self.b)
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
            database_path: db_path.clone(),
            ..Default::default()
        })
        .await?,
    );
    let queue = TaskQueue::new(backend.clone());
    info!(database_path = ?db_path, "queue connected");

    info!("2. Enqueuing tasks...");
    let task_id_1 = queue.enqueue(&SayHello { name: "World".into() }, None).await?;
    info!(task_id = %task_id_1, "enqueued async-style task");
    let task_id_2 = queue.enqueue(&AddNumbers { a: 5, b: 3 }, None).await?;
    info!(task_id = %task_id_2, "enqueued sync-style task");

    info!("3. Starting worker...");
    let registry = Arc::new(JobRegistry::new().with::<SayHello>().with::<AddNumbers>());
    let worker = Arc::new(Worker::new(backend, registry, WorkerConfig::default())?);
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    info!("4. Retrieving results...");
    let result_1 = queue.await_result(&task_id_1, Duration::from_secs(5)).await?;
    info!(task_id = %task_id_1, value = ?result_1.value, "result");

    let result_2 = queue.await_result(&task_id_2, Duration::from_secs(5)).await?;
    info!(task_id = %task_id_2, value = ?result_2.value, "result");

    info!("5. Stopping worker...");
    worker.stop().await;
    info!("worker stopped");

    Ok(())
}
