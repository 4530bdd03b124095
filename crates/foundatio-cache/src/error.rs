use foundatio_core::serializer::SerializationError;
use thiserror::Error;

/// Errors raised by cache clients.
///
/// Missing keys, expired entries and failed conditional writes are results,
/// not errors; this type covers configuration and serialization faults.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key must not be empty")]
    EmptyKey,

    #[error("value stored at {key:?} is not numeric")]
    NotNumeric { key: String },

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
