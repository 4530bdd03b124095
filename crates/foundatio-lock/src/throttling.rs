//! Fixed-window call admission.
//!
//! Admissions are counted in a cache counter keyed by
//! `throttle:<resource>:<window>` where `window = floor(now / period)`.
//! Overflowing acquisitions decrement their speculative count back and
//! sleep until the next window boundary. The returned lock is a no-op:
//! throttling is admission control, not mutual exclusion.

use crate::error::LockError;
use crate::lock::{Lock, LockProvider, DEFAULT_ACQUIRE_TIMEOUT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foundatio_cache::CacheClient;
use foundatio_core::clock::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Admits at most `max_hits` acquisitions per fixed window of `period`.
pub struct ThrottlingLockProvider {
    cache: Arc<dyn CacheClient>,
    clock: Arc<dyn Clock>,
    max_hits: i64,
    period: Duration,
}

/// Builder for [`ThrottlingLockProvider`].
///
/// Defaults: 100 hits per 60 second window.
pub struct ThrottlingLockProviderBuilder {
    cache: Arc<dyn CacheClient>,
    clock: Option<Arc<dyn Clock>>,
    max_hits: i64,
    period: Duration,
}

impl ThrottlingLockProviderBuilder {
    pub fn new(cache: Arc<dyn CacheClient>) -> Self {
        Self {
            cache,
            clock: None,
            max_hits: 100,
            period: Duration::from_secs(60),
        }
    }

    pub fn max_hits(mut self, max_hits: i64) -> Self {
        self.max_hits = max_hits.max(1);
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ThrottlingLockProvider {
        ThrottlingLockProvider {
            cache: self.cache,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock::default())),
            max_hits: self.max_hits,
            period: self.period,
        }
    }
}

impl ThrottlingLockProvider {
    pub fn builder(cache: Arc<dyn CacheClient>) -> ThrottlingLockProviderBuilder {
        ThrottlingLockProviderBuilder::new(cache)
    }

    fn period_millis(&self) -> i64 {
        self.period.as_millis().max(1) as i64
    }
}

#[async_trait]
impl LockProvider for ThrottlingLockProvider {
    async fn acquire(
        &self,
        resource: &str,
        _time_until_expires: Option<Duration>,
        acquire_timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Result<Option<Box<dyn Lock>>, LockError> {
        let timeout = acquire_timeout.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT);
        let started = self.clock.monotonic();
        // Counters outlive their window so a boundary-straddling decrement
        // still finds its key.
        let counter_ttl = self.period.saturating_mul(2);

        loop {
            if token.is_cancelled() {
                return Ok(None);
            }

            let now = self.clock.now();
            let window = now.timestamp_millis().div_euclid(self.period_millis());
            let key = format!("throttle:{resource}:{window}");

            let count = self.cache.increment(&key, 1, Some(counter_ttl)).await?;
            if count <= self.max_hits {
                let waited = self.clock.monotonic().saturating_sub(started);
                return Ok(Some(Box::new(ThrottleLock {
                    resource: resource.to_string(),
                    lock_id: Uuid::new_v4().to_string(),
                    acquired_at: now,
                    time_waited: waited,
                })));
            }

            // Over capacity: undo the speculative hit and wait the window out.
            self.cache.increment(&key, -1, None).await?;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                resource,
                max_hits = self.max_hits,
                "throttle window exhausted, waiting for next window"
            );

            let elapsed = self.clock.monotonic().saturating_sub(started);
            if elapsed >= timeout {
                return Ok(None);
            }
            let remaining = timeout - elapsed;

            let window_end_millis = (window + 1) * self.period_millis();
            let until_next_window = Duration::from_millis(
                (window_end_millis - now.timestamp_millis()).max(1) as u64,
            );
            let wait = remaining.min(until_next_window);

            tokio::select! {
                _ = self.clock.sleep(wait) => {}
                _ = token.cancelled() => return Ok(None),
            }
        }
    }

    /// Throttling grants are not mutually exclusive, so a resource is never
    /// reported as locked.
    async fn is_locked(&self, _resource: &str) -> Result<bool, LockError> {
        Ok(false)
    }
}

struct ThrottleLock {
    resource: String,
    lock_id: String,
    acquired_at: DateTime<Utc>,
    time_waited: Duration,
}

#[async_trait]
impl Lock for ThrottleLock {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn lock_id(&self) -> &str {
        &self.lock_id
    }

    fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    fn time_waited(&self) -> Duration {
        self.time_waited
    }

    fn renewal_count(&self) -> usize {
        0
    }

    async fn release(&self) -> Result<(), LockError> {
        Ok(())
    }

    async fn renew(&self, _time_until_expires: Option<Duration>) -> Result<bool, LockError> {
        Ok(true)
    }
}
