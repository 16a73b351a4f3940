//! # Task Storage Backends
//!
//! **The serialization point of the task queue.** Durable task storage with
//! atomic reservation, exposed behind one `Backend` trait with two shipped
//! realizations: [`InMemoryBackend`] for development/testing and
//! [`SqliteBackend`] for durable single-instance or multi-worker-process
//! deployments.
//!
//! ## Quick start
//!
//! ```rust
//! use sitq_backend::prelude::*;
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), BackendError> {
//! let backend = InMemoryBackend::new();
//! backend.connect().await?;
//!
//! backend.enqueue("task-1", b"payload".to_vec(), Utc::now()).await?;
//! let reserved = backend.reserve(10, Utc::now()).await?;
//! assert_eq!(reserved.len(), 1);
//!
//! backend.mark_success("task-1", b"result".to_vec(), Utc::now()).await?;
//! let result = backend.get_result("task-1").await?.unwrap();
//! assert_eq!(result.status, TaskStatus::Success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`traits`] — the `Backend` trait and `TaskRecord` / `ReservedTask` / `TaskResult` models
//! - [`in_memory`] — mutex-guarded `HashMap` realization
//! - [`sqlite`] — `sqlx`-backed realization with WAL mode and `IMMEDIATE` reservation transactions

pub mod error;
#[cfg(feature = "in-memory")]
pub mod in_memory;
pub mod prelude;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use error::BackendError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryBackend, InMemoryBackendConfig};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteBackendConfig};
pub use traits::{Backend, LeaseToken, ReservedTask, TaskRecord, TaskResult, TaskStatus};
