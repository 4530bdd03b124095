//! Cross-process wire format.
//!
//! When a bus implementation crosses a process boundary, payloads travel as
//! a small envelope: the declared type name (used for routing on the
//! receiving side) plus the serialized payload bytes. The in-memory bus
//! never uses this; it routes on `TypeId` and hands out clones.

use foundatio_core::serializer::{SerializationError, Serializer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// `{ type_name, data }` routing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub type_name: String,
    pub data: Vec<u8>,
}

impl MessageEnvelope {
    /// Wraps a message: serializes the payload and records its type name.
    pub fn wrap<T, S>(
        type_name: &str,
        message: &T,
        serializer: &S,
    ) -> Result<Self, SerializationError>
    where
        T: Serialize,
        S: Serializer + ?Sized,
    {
        Ok(Self {
            type_name: type_name.to_string(),
            data: serializer.serialize(message)?,
        })
    }

    /// Recovers the payload. The caller chooses `T` from `type_name`; a
    /// mismatch surfaces as a deserialization error.
    pub fn open<T, S>(&self, serializer: &S) -> Result<T, SerializationError>
    where
        T: DeserializeOwned,
        S: Serializer + ?Sized,
    {
        serializer.deserialize(&self.data)
    }

    pub fn to_bytes<S: Serializer + ?Sized>(
        &self,
        serializer: &S,
    ) -> Result<Vec<u8>, SerializationError> {
        serializer.serialize(self)
    }

    pub fn from_bytes<S: Serializer + ?Sized>(
        bytes: &[u8],
        serializer: &S,
    ) -> Result<Self, SerializationError> {
        serializer.deserialize(bytes)
    }
}
