//! # Blocking Façade
//!
//! [`SyncTaskQueue`] lets code with no running Tokio runtime — a plain
//! `fn main`, a thread spawned by a synchronous framework — enqueue jobs and
//! collect results without touching `async`/`await` directly. It owns a
//! dedicated OS thread running a current-thread Tokio runtime underneath.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serde::{Deserialize, Serialize};
//! use sitq_backend::InMemoryBackend;
//! use sitq_codec::{Job, JobError};
//! use sitq_sync::SyncTaskQueue;
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
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let queue = SyncTaskQueue::new(backend)?;
//! let task_id = queue.enqueue(Add { a: 2, b: 3 }, None)?;
//! let _ = task_id;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod prelude;
pub mod sync_queue;

pub use error::{ConfigurationError, SyncError, TaskExecutionError};
pub use sync_queue::SyncTaskQueue;
