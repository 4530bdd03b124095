//! Bounded-retry execution for foundatio.
//!
//! A [`ResiliencePolicy`] runs an async operation up to `max_attempts`
//! times, sleeping between attempts with fixed or exponential backoff,
//! optional jitter and an optional delay cap. An error classifier decides
//! which failures are worth retrying; cancellation aborts the in-flight
//! attempt and any pending sleep and surfaces as
//! [`PolicyError::Canceled`].
//!
//! # Examples
//!
//! ```
//! use foundatio_resilience::ResiliencePolicy;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[derive(Debug)]
//! # struct FetchError;
//! # async fn fetch(_: CancellationToken) -> Result<String, FetchError> { Ok("ok".into()) }
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let policy = ResiliencePolicy::<FetchError>::builder()
//!     .max_attempts(5)
//!     .exponential_backoff(Duration::from_millis(50))
//!     .max_delay(Duration::from_secs(2))
//!     .use_jitter()
//!     .build();
//!
//! let result = policy.execute(fetch, CancellationToken::new()).await;
//! assert!(result.is_ok());
//! # }
//! ```

mod config;
mod error;
mod events;

pub use config::ResiliencePolicyBuilder;
pub use error::PolicyError;
pub use events::RetryEvent;

use foundatio_core::clock::Clock;
use foundatio_core::events::EventListeners;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Executes operations with bounded retries.
///
/// Cloning is cheap; clones share the configuration and event listeners.
pub struct ResiliencePolicy<E> {
    pub(crate) name: String,
    pub(crate) max_attempts: usize,
    pub(crate) delay: Duration,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) exponential: bool,
    pub(crate) jitter: bool,
    pub(crate) classifier: Option<Arc<dyn Fn(&E) -> bool + Send + Sync>>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl<E> Clone for ResiliencePolicy<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            max_attempts: self.max_attempts,
            delay: self.delay,
            max_delay: self.max_delay,
            exponential: self.exponential,
            jitter: self.jitter,
            classifier: self.classifier.clone(),
            clock: Arc::clone(&self.clock),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl<E> ResiliencePolicy<E> {
    pub fn builder() -> ResiliencePolicyBuilder<E> {
        ResiliencePolicyBuilder::new()
    }

    /// A policy that executes exactly once, with no retry bookkeeping.
    pub fn no_retries() -> Self {
        Self::builder().max_attempts(1).build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Runs `op` until it succeeds, fails fatally, exhausts its attempts,
    /// or `token` fires.
    ///
    /// The operation receives a token linked to `token`; cancelling the
    /// outer token drops the in-flight attempt and aborts any backoff
    /// sleep.
    pub async fn execute<T, F, Fut>(&self, op: F, token: CancellationToken) -> Result<T, PolicyError<E>>
    where
        F: Fn(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1usize;

        loop {
            if token.is_cancelled() {
                return Err(PolicyError::Canceled);
            }

            let outcome = tokio::select! {
                outcome = op(token.child_token()) => outcome,
                _ = token.cancelled() => return Err(PolicyError::Canceled),
            };

            match outcome {
                Ok(value) => {
                    if !self.event_listeners.is_empty() {
                        self.event_listeners.emit(&RetryEvent::Success {
                            policy_name: self.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                    }
                    #[cfg(feature = "tracing")]
                    if attempt > 1 {
                        tracing::debug!(policy = %self.name, attempts = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.is_retryable(&error) {
                        self.event_listeners.emit(&RetryEvent::Fatal {
                            policy_name: self.name.clone(),
                            timestamp: Instant::now(),
                        });
                        #[cfg(feature = "tracing")]
                        tracing::debug!(policy = %self.name, "error not retryable, failing immediately");
                        return Err(PolicyError::Inner(error));
                    }

                    if attempt >= self.max_attempts {
                        self.event_listeners.emit(&RetryEvent::Exhausted {
                            policy_name: self.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        #[cfg(feature = "tracing")]
                        tracing::warn!(policy = %self.name, attempts = attempt, "retry attempts exhausted");
                        return Err(PolicyError::Inner(error));
                    }

                    let delay = self.backoff_delay(attempt);
                    self.event_listeners.emit(&RetryEvent::Retry {
                        policy_name: self.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay,
                    });
                    #[cfg(feature = "tracing")]
                    tracing::debug!(policy = %self.name, attempt, delay_ms = delay.as_millis() as u64, "retrying after delay");

                    tokio::select! {
                        _ = self.clock.sleep(delay) => {}
                        _ = token.cancelled() => return Err(PolicyError::Canceled),
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn is_retryable(&self, error: &E) -> bool {
        match &self.classifier {
            Some(classify) => classify(error),
            None => true,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`.
    fn backoff_delay(&self, attempt: usize) -> Duration {
        let mut delay = if self.exponential {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(31) as u32);
            self.delay.saturating_mul(factor)
        } else {
            self.delay
        };

        if let Some(max_delay) = self.max_delay {
            delay = delay.min(max_delay);
        }

        if self.jitter {
            use rand::Rng;
            let factor: f64 = rand::rng().random_range(0.5..1.5);
            delay = delay.mul_f64(factor);
        }

        delay
    }
}
