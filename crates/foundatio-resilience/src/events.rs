use foundatio_core::events::Event;
use std::time::{Duration, Instant};

/// Events emitted while a policy executes an operation.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A failed attempt will be retried after `delay`.
    Retry {
        policy_name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// The operation succeeded after `attempts` total attempts.
    Success {
        policy_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Attempts were exhausted; the final error is returned to the caller.
    Exhausted {
        policy_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The error was classified as not retryable and returned immediately.
    Fatal {
        policy_name: String,
        timestamp: Instant,
    },
}

impl Event for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::Fatal { .. } => "fatal",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::Fatal { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RetryEvent::Retry { policy_name, .. }
            | RetryEvent::Success { policy_name, .. }
            | RetryEvent::Exhausted { policy_name, .. }
            | RetryEvent::Fatal { policy_name, .. } => policy_name,
        }
    }
}
