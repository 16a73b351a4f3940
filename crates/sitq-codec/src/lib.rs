//! # Envelope Codec and Job Registry
//!
//! Treats every enqueued unit of work as an opaque `bytes <-> object` mapping.
//! The payload shape is `{job_name, args}` — see [`job`] for why a named
//! registry entry stands in for a captured closure, and [`envelope`] for the
//! `Codec` trait that turns it into bytes.

pub mod envelope;
pub mod error;
pub mod job;
pub mod prelude;
pub mod registry;

pub use envelope::{Codec, Envelope, JsonCodec};
pub use error::{DecodeError, EncodeError};
pub use job::{Job, JobError};
pub use registry::{encode_job, JobRegistry};
