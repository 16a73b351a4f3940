//! Error types for the encode/decode boundary.

/// Raised when a value fails to serialize into the wire representation.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Raised when bytes fail to deserialize back into a value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to deserialize {what}: {source}")]
    Deserialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
