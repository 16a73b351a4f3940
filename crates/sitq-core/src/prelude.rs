//! Prelude module for convenient imports.
//!
//! ```rust
//! use sitq_core::prelude::*;
//! ```

pub use crate::error::{TaskQueueError, TimeoutError, ValidationError, WorkerError};
pub use crate::queue::{TaskQueue, TaskResult};
pub use crate::worker::{Worker, WorkerConfig};
