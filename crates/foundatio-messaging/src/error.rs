use foundatio_core::serializer::SerializationError;
use thiserror::Error;

/// Errors raised by message buses.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("message bus has been disposed")]
    Disposed,

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
