//! # Task Queue Core
//!
//! The async producer/consumer surface of the task queue: [`TaskQueue`] for
//! enqueuing jobs and retrieving their results, and [`Worker`] for the
//! bounded-concurrency polling loop that executes them.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sitq_backend::InMemoryBackend;
//! use sitq_codec::{Job, JobError, JobRegistry};
//! use sitq_core::{TaskQueue, Worker, WorkerConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Add { a: i64, b: i64 }
//!
//! #[async_trait::async_trait]
//! impl Job for Add {
//!     const NAME: &'static str = "add";
//!     type Output = i64;
//!     async fn run(&self) -> Result<i64, JobError> {
//!         Ok(self.a + self.b)
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let registry = Arc::new(JobRegistry::new().with::<Add>());
//!
//! let queue = TaskQueue::new(backend.clone());
//! let task_id = queue.enqueue(&Add { a: 2, b: 3 }, None).await?;
//!
//! let worker = Worker::new(backend, registry, WorkerConfig::default())?;
//! tokio::spawn(async move { worker.start().await });
//!
//! let result = queue.await_result(&task_id, Duration::from_secs(5)).await?;
//! assert_eq!(result.value, Some(serde_json::json!(5)));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod prelude;
pub mod queue;
pub mod worker;

pub use error::{TaskQueueError, TimeoutError, ValidationError, WorkerError};
pub use queue::{TaskQueue, TaskResult};
pub use worker::{Worker, WorkerConfig};
