//! The `Job` trait. A job is a plain data value (its fields ARE the
//! arguments) paired with a stable registry name and an async body.
//!
//! A raw Rust closure can't cross a process boundary: there's no portable way
//! to serialize captured state. `Job` makes the call envelope concrete as
//! `{job_name, args}`, where `job_name` selects one of these implementations
//! out of a [`crate::registry::JobRegistry`] built identically on producer and
//! worker.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Raised by a job body. Always becomes a persisted task failure — it never
/// unwinds the worker's polling loop.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct JobError {
    pub message: String,
    pub traceback: Option<String>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    pub fn with_traceback(message: impl Into<String>, traceback: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: Some(traceback.into()),
        }
    }
}

/// A unit of deferred work: a job's fields are its args/kwargs, `NAME` is its
/// `func`, and `run` is the body a worker executes after decoding.
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable name under which this job is registered. Producers and workers
    /// must agree on it — it is the wire representation of `func`.
    const NAME: &'static str;

    /// The value this job resolves to on success.
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Execute the job body. Implementations that do CPU-bound or blocking
    /// work should offload via `tokio::task::spawn_blocking` themselves —
    /// the worker always awaits this cooperatively.
    async fn run(&self) -> Result<Self::Output, JobError>;
}
