//! Prelude module for convenient imports.
//!
//! ```rust
//! use sitq_backend::prelude::*;
//! ```

pub use crate::error::BackendError;
#[cfg(feature = "in-memory")]
pub use crate::in_memory::{InMemoryBackend, InMemoryBackendConfig};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteBackend, SqliteBackendConfig};
pub use crate::traits::{Backend, LeaseToken, ReservedTask, TaskRecord, TaskResult, TaskStatus};
