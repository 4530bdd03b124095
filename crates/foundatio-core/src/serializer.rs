//! Serialization contract for payloads crossing a process boundary.
//!
//! The in-memory backends never serialize; they rely on ownership and
//! `Clone`. Remote cache/queue/bus adapters use this contract for stored
//! values and wire payloads, and the messaging envelope uses it for the
//! cross-process type header.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by [`Serializer`] implementations.
///
/// Serialization failures are fatal per the error taxonomy: they indicate a
/// programming or configuration fault, not an operational condition.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to deserialize payload: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// `serialize(value) -> bytes` / `deserialize(bytes) -> value`.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError>;

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError>;
}

/// JSON serializer backed by `serde_json`, the default wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(SerializationError::Serialize)
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(data).map_err(SerializationError::Deserialize)
    }
}
