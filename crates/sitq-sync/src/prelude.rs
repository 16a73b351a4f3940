//! Prelude module for convenient imports.
//!
//! ```rust
//! use sitq_sync::prelude::*;
//! ```

pub use crate::error::{ConfigurationError, SyncError, TaskExecutionError};
pub use crate::sync_queue::SyncTaskQueue;
