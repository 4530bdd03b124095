//! Stored value representation.

use crate::error::CacheError;
use foundatio_core::serializer::SerializationError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A value held by a cache entry.
///
/// Counters live in the `Integer` variant so `increment`, `set_if_higher`
/// and `set_if_lower` can operate on them atomically. Everything else is
/// stored as a JSON document: the typed accessors in `CacheClientExt`
/// round-trip through this representation, which makes every value handed
/// back to a caller an independent copy.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Integer(i64),
    Json(serde_json::Value),
}

impl CacheValue {
    /// Converts a serializable value into its stored form. Integral JSON
    /// numbers are stored natively so they remain usable as counters.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CacheError> {
        let json = serde_json::to_value(value)
            .map_err(|err| CacheError::Serialization(SerializationError::Serialize(err)))?;
        Ok(match json.as_i64() {
            Some(n) => CacheValue::Integer(n),
            None => CacheValue::Json(json),
        })
    }

    /// Converts the stored form back into a concrete type.
    pub fn into_deserialize<T: DeserializeOwned>(self) -> Result<T, CacheError> {
        let json = match self {
            CacheValue::Integer(n) => serde_json::Value::from(n),
            CacheValue::Json(json) => json,
        };
        serde_json::from_value(json)
            .map_err(|err| CacheError::Serialization(SerializationError::Deserialize(err)))
    }

    /// The numeric reading of this value, if it has one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CacheValue::Integer(n) => Some(*n),
            CacheValue::Json(json) => json.as_i64(),
        }
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        CacheValue::Integer(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Json(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Json(serde_json::Value::String(value))
    }
}
