use std::fmt;

/// Outcome wrapper for [`crate::ResiliencePolicy::execute`].
///
/// Cancellation is a dedicated variant so callers can tell "the caller gave
/// up" apart from "the operation kept failing"; it is never produced by the
/// operation itself and never counts as a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError<E> {
    /// The cancellation token fired during the operation or a backoff sleep.
    Canceled,

    /// The operation's final error: either classified as not retryable, or
    /// still failing once attempts were exhausted.
    Inner(E),
}

impl<E> PolicyError<E> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, PolicyError::Canceled)
    }

    /// Extracts the operation error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PolicyError::Canceled => None,
            PolicyError::Inner(e) => Some(e),
        }
    }
}

impl<E: fmt::Display> fmt::Display for PolicyError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Canceled => write!(f, "operation was canceled"),
            PolicyError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error> std::error::Error for PolicyError<E> {}
