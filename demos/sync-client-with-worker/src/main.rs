//! A synchronous producer thread submitting work through [`SyncTaskQueue`]
//! while an async worker, running on its own Tokio runtime in a separate
//! thread, drains the same SQLite-backed queue.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitq_backend::{Backend, SqliteBackend, SqliteBackendConfig};
use sitq_codec::{Job, JobError, JobRegistry};
use sitq_core::{Worker, WorkerConfig};
use sitq_sync::SyncTaskQueue;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct AsyncTask {
    name: String,
}

#[async_trait::async_trait]
impl Job for AsyncTask {
    const NAME: &'static str = "async_task";
    type Output = String;

    async fn run(&self) -> Result<String, JobError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(format!("Async processed: {}", self.name))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SyncMultiply {
    a: i64,
    b: i64,
}

#[async_trait::async_trait]
impl Job for SyncMultiply {
    const NAME: &'static str = "sync_multiply";
    type Output = i64;

    async fn run(&self) -> Result<i64, JobError> {
        Ok(self.a * self.b)
    }
}

fn run_sync_producer(backend: Arc<dyn Backend>) -> anyhow::Result<Vec<(String, serde_json::Value)>> {
    info!("[sync producer] enqueueing tasks...");
    let queue = SyncTaskQueue::new(backend.clone())?;

    let task_id_1 = queue.enqueue(SyncMultiply { a: 5, b: 3 }, None)?;
    let task_id_2 = queue.enqueue(AsyncTask { name: "Task A".into() }, None)?;
    let task_id_3 = queue.enqueue(AsyncTask { name: "Task B".into() }, None)?;
    let task_id_4 = queue.enqueue(SyncMultiply { a: 7, b: 2 }, None)?;
    let task_ids = vec![task_id_1, task_id_2, task_id_3, task_id_4];

    for task_id in &task_ids {
        info!(task_id = %task_id, "[sync producer] enqueued");
    }
    drop(queue);

    info!("[sync producer] waiting for worker to process...");
    thread::sleep(Duration::from_secs(2));

    info!("[sync producer] retrieving results...");
    let queue = SyncTaskQueue::new(backend)?;
    let mut results = Vec::new();
    for task_id in &task_ids {
        let value = queue
            .get_result(task_id, Some(Duration::from_secs(5)))?
            .unwrap_or(serde_json::Value::Null);
        info!(task_id = %task_id, ?value, "[sync producer] result");
        results.push((task_id.clone(), value));
    }

    Ok(results)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let tmpdir = tempfile::tempdir()?;
    let db_path = tmpdir.path().join("tasks.db");

    info!("1. Setting up shared backend at {:?}", db_path);

    info!("2. Starting async worker in background thread...");
    let worker_db_path = db_path.clone();
    let worker_thread = thread::spawn(move || -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async move {
            let backend = Arc::new(
                SqliteBackend::with_config(SqliteBackendConfig {
                    database_path: worker_db_path,
                    ..Default::default()
                })
                .await?,
            );
            let registry = Arc::new(JobRegistry::new().with::<AsyncTask>().with::<SyncMultiply>());
            let worker = Arc::new(Worker::new(backend, registry, WorkerConfig::default())?);
            let worker_handle = worker.clone();
            let join = tokio::spawn(async move { worker_handle.start().await });

            tokio::time::sleep(Duration::from_secs(4)).await;
            worker.stop().await;
            join.await??;
            Ok(())
        })
    });

    thread::sleep(Duration::from_millis(500));
    info!("[async worker] running");

    info!("3. Running sync producer in separate thread...");
    let producer_backend = {
        let runtime = tokio::runtime::Runtime::new()?;
        let backend = runtime.block_on(SqliteBackend::with_config(SqliteBackendConfig {
            database_path: db_path,
            ..Default::default()
        }))?;
        Arc::new(backend) as Arc<dyn Backend>
    };

    let producer_thread = thread::spawn(move || run_sync_producer(producer_backend));
    let results = producer_thread.join().expect("producer thread panicked")?;

    info!("4. Waiting for async worker to finish...");
    worker_thread.join().expect("worker thread panicked")?;

    info!("5. Summary of processed tasks:");
    for (task_id, value) in &results {
        info!(task_id = %task_id, ?value, "processed");
    }

    Ok(())
}
