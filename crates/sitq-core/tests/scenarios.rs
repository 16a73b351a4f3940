//! End-to-end scenarios against an in-memory backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sitq_backend::InMemoryBackend;
use sitq_codec::{Job, JobError, JobRegistry};
use sitq_core::{TaskQueue, Worker, WorkerConfig};

#[derive(Debug, Serialize, Deserialize)]
struct Add {
    a: i64,
    b: i64,
}

#[async_trait::async_trait]
impl Job for Add {
    const NAME: &'static str = "add";
    type Output = i64;

    async fn run(&self) -> Result<i64, JobError> {
        Ok(self.a + self.b)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NowIso;

#[async_trait::async_trait]
impl Job for NowIso {
    const NAME: &'static str = "now_iso";
    type Output = String;

    async fn run(&self) -> Result<String, JobError> {
        Ok(Utc::now().to_rfc3339())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Boom;

#[async_trait::async_trait]
impl Job for Boom {
    const NAME: &'static str = "boom";
    type Output = ();

    async fn run(&self) -> Result<(), JobError> {
        Err(JobError::with_traceback("boom", "at boom::run"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SleepJob {
    millis: u64,
}

#[async_trait::async_trait]
impl Job for SleepJob {
    const NAME: &'static str = "sleep_job";
    type Output = ();

    async fn run(&self) -> Result<(), JobError> {
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        Ok(())
    }
}

// Process-wide counters observed by `CountingSleepJob::run`. A job's fields
// are its only serialized state, so the shared concurrency counters a test
// needs to observe have to live outside the job itself.
static CONCURRENT: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct CountingSleepJob {
    millis: u64,
}

#[async_trait::async_trait]
impl Job for CountingSleepJob {
    const NAME: &'static str = "counting_sleep_job";
    type Output = ();

    async fn run(&self) -> Result<(), JobError> {
        let current = CONCURRENT.fetch_add(1, Ordering::SeqCst) + 1;
        PEAK.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.millis)).await;
        CONCURRENT.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn s1_immediate_success() {
    let backend = Arc::new(InMemoryBackend::new());
    let registry = Arc::new(JobRegistry::new().with::<Add>());
    let queue = TaskQueue::new(backend.clone());

    let task_id = queue.enqueue(&Add { a: 2, b: 3 }, None).await.unwrap();

    let worker = Arc::new(Worker::new(backend, registry, WorkerConfig::default()).unwrap());
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    let result = queue
        .await_result(&task_id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.value, Some(serde_json::json!(5)));

    worker.stop().await;
}

#[tokio::test]
async fn s2_delayed_eligibility() {
    let backend = Arc::new(InMemoryBackend::new());
    let registry = Arc::new(JobRegistry::new().with::<NowIso>());
    let queue = TaskQueue::new(backend.clone());

    let eta = Utc::now() + chrono::Duration::seconds(2);
    let task_id = queue.enqueue(&NowIso, Some(eta)).await.unwrap();

    let worker = Arc::new(Worker::new(backend, registry, WorkerConfig::default()).unwrap());
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    let early = queue
        .get_result(&task_id, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(early.is_none());

    let result = queue
        .await_result(&task_id, Duration::from_secs(5))
        .await
        .unwrap();
    let payload_ts: chrono::DateTime<Utc> = result
        .value
        .unwrap()
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(payload_ts >= eta);

    worker.stop().await;
}

#[tokio::test]
async fn s3_bounded_concurrency() {
    CONCURRENT.store(0, Ordering::SeqCst);
    PEAK.store(0, Ordering::SeqCst);

    let backend = Arc::new(InMemoryBackend::new());
    let registry = Arc::new(JobRegistry::new().with::<CountingSleepJob>());
    let queue = TaskQueue::new(backend.clone());

    let mut task_ids = Vec::new();
    for _ in 0..5 {
        task_ids.push(
            queue
                .enqueue(&CountingSleepJob { millis: 200 }, None)
                .await
                .unwrap(),
        );
    }

    let config = WorkerConfig::default().with_max_concurrency(2);
    let worker = Arc::new(Worker::new(backend, registry, config).unwrap());
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    for task_id in &task_ids {
        let result = queue
            .await_result(task_id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.status, sitq_backend::TaskStatus::Success);
    }

    worker.stop().await;

    assert_eq!(PEAK.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn s4_failure_capture_and_worker_survives() {
    let backend = Arc::new(InMemoryBackend::new());
    let registry = Arc::new(JobRegistry::new().with::<Boom>().with::<Add>());
    let queue = TaskQueue::new(backend.clone());

    let boom_id = queue.enqueue(&Boom, None).await.unwrap();

    let worker = Arc::new(Worker::new(backend, registry, WorkerConfig::default()).unwrap());
    let worker_handle = worker.clone();
    tokio::spawn(async move { worker_handle.start().await });

    let result = queue
        .await_result(&boom_id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.status, sitq_backend::TaskStatus::Failed);
    assert!(result.error.unwrap().contains("boom"));
    assert!(result.traceback.unwrap().contains("boom"));

    // The worker must keep serving subsequent tasks after a job failure.
    let add_id = queue.enqueue(&Add { a: 10, b: 20 }, None).await.unwrap();
    let result = queue
        .await_result(&add_id, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.value, Some(serde_json::json!(30)));

    worker.stop().await;
}

#[tokio::test]
async fn s5_graceful_drain_waits_for_in_flight_job() {
    let backend = Arc::new(InMemoryBackend::new());
    let registry = Arc::new(JobRegistry::new().with::<SleepJob>());
    let queue = TaskQueue::new(backend.clone());

    let task_id = queue
        .enqueue(&SleepJob { millis: 500 }, None)
        .await
        .unwrap();

    let worker = Arc::new(Worker::new(backend, registry, WorkerConfig::default()).unwrap());
    let worker_handle = worker.clone();
    let handle = tokio::spawn(async move { worker_handle.start().await });

    // Give the worker a moment to reserve and begin executing the task.
    tokio::time::sleep(Duration::from_millis(150)).await;

    worker.stop().await;
    handle.await.unwrap().unwrap();

    let result = queue.get_result(&task_id, None).await.unwrap().unwrap();
    assert_eq!(result.status, sitq_backend::TaskStatus::Success);
}
