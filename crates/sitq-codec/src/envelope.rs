//! The call envelope and the opaque bytes<->object `Codec` boundary.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, EncodeError};

/// The serialized `{job_name, args}` pair stored as a task's `payload`.
///
/// `job_name` selects the callable (see [`crate::job::Job`]), and `args`
/// carries whatever a concrete job serializes itself into — positional and
/// keyword arguments collapse into one JSON object since the job type itself
/// defines the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub job_name: String,
    pub args: serde_json::Value,
}

/// Total two-operation contract consulted at exactly three points in the
/// system: producer encode, worker decode, worker encode of the result
/// (consumer decode reuses the same `decode`).
pub trait Codec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, EncodeError>;
    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, DecodeError>;
}

/// The default, and currently only, codec: JSON over the wire.
///
/// Every example and test in this codebase uses `JsonCodec`; a binary codec
/// (e.g. `rmp-serde`) would implement the same trait without touching
/// `sitq-backend` or `sitq-core`, since both treat the payload as opaque
/// bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(value).map_err(|e| EncodeError::Serialize {
            what: "envelope",
            source: e,
        })
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Deserialize {
            what: "envelope",
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_envelope() {
        let codec = JsonCodec;
        let envelope = Envelope {
            job_name: "add".to_string(),
            args: serde_json::json!({"a": 2, "b": 3}),
        };

        let bytes = codec.encode(&envelope).unwrap();
        let decoded: Envelope = codec.decode(&bytes).unwrap();

        assert_eq!(decoded.job_name, "add");
        assert_eq!(decoded.args, serde_json::json!({"a": 2, "b": 3}));
    }

    #[test]
    fn decode_rejects_corrupted_bytes() {
        let codec = JsonCodec;
        let err = codec.decode::<Envelope>(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::Deserialize { .. }));
    }
}
