//! Prelude module for convenient imports.
//!
//! ```rust
//! use sitq_codec::prelude::*;
//! ```

pub use crate::envelope::{Codec, Envelope, JsonCodec};
pub use crate::error::{DecodeError, EncodeError};
pub use crate::job::{Job, JobError};
pub use crate::registry::{encode_job, JobRegistry};
