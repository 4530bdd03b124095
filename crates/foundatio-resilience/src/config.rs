use crate::events::RetryEvent;
use crate::ResiliencePolicy;
use foundatio_core::clock::{Clock, SystemClock};
use foundatio_core::events::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`ResiliencePolicy`].
///
/// Defaults:
/// - max_attempts: 3
/// - backoff: exponential with 100ms initial delay
/// - max_delay: none
/// - jitter: off
/// - classification: every error is retryable
pub struct ResiliencePolicyBuilder<E> {
    name: String,
    max_attempts: usize,
    delay: Duration,
    max_delay: Option<Duration>,
    exponential: bool,
    jitter: bool,
    classifier: Option<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
    clock: Option<Arc<dyn Clock>>,
    event_listeners: EventListeners<RetryEvent>,
}

impl<E> Default for ResiliencePolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ResiliencePolicyBuilder<E> {
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            max_attempts: 3,
            delay: Duration::from_millis(100),
            max_delay: None,
            exponential: true,
            jitter: false,
            classifier: None,
            clock: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Total attempts, including the first. `1` disables retries.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Uses the same delay between every attempt.
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.exponential = false;
        self
    }

    /// Doubles the delay after each failed attempt, starting at `delay`.
    pub fn exponential_backoff(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.exponential = true;
        self
    }

    /// Caps the computed backoff delay.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Multiplies each delay by a random factor in [0.5, 1.5).
    pub fn use_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Classifies errors: return true to retry, false to fail immediately.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(predicate));
        self
    }

    /// Sets the name used in events and logging.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Injects a time source for backoff sleeps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Registers a callback invoked before each retry delay begins.
    pub fn on_retry<F>(self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when the operation succeeds, with the
    /// total number of attempts made.
    pub fn on_success<F>(self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    pub fn build(self) -> ResiliencePolicy<E> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::default()));
        ResiliencePolicy {
            name: self.name,
            max_attempts: self.max_attempts,
            delay: self.delay,
            max_delay: self.max_delay,
            exponential: self.exponential,
            jitter: self.jitter,
            classifier: self.classifier,
            clock,
            event_listeners: self.event_listeners,
        }
    }
}
