//! Type-erased dispatch from a job name to its decode-execute-encode body.
//!
//! Register each concrete [`Job`] once at startup, then dispatch by name at
//! decode time without the caller needing to know the concrete type.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::EncodeError;
use crate::job::{Job, JobError};

type BoxedHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, JobError>> + Send + Sync>;

/// Maps job names to type-erased handlers. Built once by whatever process
/// role (producer or worker) needs to encode or execute jobs, and shared via
/// `Arc` thereafter.
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: HashMap<&'static str, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a job type. Panics on a duplicate name — that's a
    /// programming error caught at startup, not a runtime condition.
    pub fn register<J: Job>(&mut self) -> &mut Self {
        let name = J::NAME;
        let handler: BoxedHandler = Arc::new(move |value: Value| {
            Box::pin(async move {
                let job: J = serde_json::from_value(value).map_err(|e| {
                    JobError::new(format!("failed to decode job {name:?}: {e}"))
                })?;
                let output = job.run().await?;
                serde_json::to_value(output).map_err(|e| {
                    JobError::new(format!("failed to encode output of job {name:?}: {e}"))
                })
            })
        });

        if self.handlers.insert(name, handler).is_some() {
            panic!("job {name:?} registered more than once");
        }
        self
    }

    /// Look up and build a builder-chained registry (construction-time sugar
    /// mirroring `WorkerConfig::with_*` elsewhere in this codebase).
    pub fn with<J: Job>(mut self) -> Self {
        self.register::<J>();
        self
    }

    /// Decode and execute the job named `job_name` against `args`.
    ///
    /// Returns the job's encoded output on success. The caller is responsible
    /// for turning a `JobError` into a persisted task failure — the registry
    /// itself never touches storage.
    pub async fn dispatch(&self, job_name: &str, args: Value) -> Result<Value, JobError> {
        let handler = self
            .handlers
            .get(job_name)
            .ok_or_else(|| JobError::new(format!("no job registered under name {job_name:?}")))?
            .clone();
        handler(args).await
    }

    pub fn contains(&self, job_name: &str) -> bool {
        self.handlers.contains_key(job_name)
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("registered", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Encode a concrete job into its wire envelope. Used by the producer side
/// before the bytes-only [`crate::envelope::Codec`] boundary.
pub fn encode_job<J: Job>(job: &J) -> Result<(String, Value), EncodeError> {
    let args = serde_json::to_value(job).map_err(|e| EncodeError::Serialize {
        what: "job arguments",
        source: e,
    })?;
    Ok((J::NAME.to_string(), args))
}
