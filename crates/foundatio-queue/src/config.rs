use crate::memory::InMemoryQueue;
use foundatio_core::clock::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`InMemoryQueue`].
///
/// Defaults:
/// - retries: 2 (an item is delivered at most 3 times)
/// - retry_delay: 1s, multiplied per retry by `[1, 3, 5, 10]`
/// - max_retry_delay: 5 minutes
/// - work_item_timeout: 5 minutes
/// - dead_letter_max_items: 100, dead_letter_ttl: 1 day
pub struct InMemoryQueueBuilder {
    pub(crate) name: String,
    pub(crate) retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) retry_multipliers: Vec<u32>,
    pub(crate) max_retry_delay: Duration,
    pub(crate) work_item_timeout: Duration,
    pub(crate) dead_letter_max_items: usize,
    pub(crate) dead_letter_ttl: Duration,
    pub(crate) clock: Option<Arc<dyn Clock>>,
}

impl Default for InMemoryQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueBuilder {
    pub fn new() -> Self {
        Self {
            name: "in-memory".to_string(),
            retries: 2,
            retry_delay: Duration::from_secs(1),
            retry_multipliers: vec![1, 3, 5, 10],
            max_retry_delay: Duration::from_secs(300),
            work_item_timeout: Duration::from_secs(300),
            dead_letter_max_items: 100,
            dead_letter_ttl: Duration::from_secs(24 * 60 * 60),
            clock: None,
        }
    }

    /// Sets the queue name used in events and logging.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Maximum redeliveries after the first attempt; an item abandoned more
    /// than `retries` times is deadlettered.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay before a retry re-enters the ready list. Zero re-queues
    /// abandoned items immediately.
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Per-retry multipliers applied to `retry_delay`; the last value is
    /// reused once the vector is exhausted.
    pub fn retry_multipliers(mut self, retry_multipliers: Vec<u32>) -> Self {
        if !retry_multipliers.is_empty() {
            self.retry_multipliers = retry_multipliers;
        }
        self
    }

    /// Upper bound on the computed retry delay.
    pub fn max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
        self.max_retry_delay = max_retry_delay;
        self
    }

    /// Lease duration granted per dequeue.
    pub fn work_item_timeout(mut self, work_item_timeout: Duration) -> Self {
        self.work_item_timeout = work_item_timeout;
        self
    }

    /// Cap on the deadletter list; the oldest entry is evicted when full.
    pub fn dead_letter_max_items(mut self, dead_letter_max_items: usize) -> Self {
        self.dead_letter_max_items = dead_letter_max_items.max(1);
        self
    }

    /// Retention of deadlettered items.
    pub fn dead_letter_ttl(mut self, dead_letter_ttl: Duration) -> Self {
        self.dead_letter_ttl = dead_letter_ttl;
        self
    }

    /// Injects a time source; leases, retry delays and retention follow it.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build<T: Clone + Send + Sync + 'static>(mut self) -> InMemoryQueue<T> {
        let clock = self
            .clock
            .take()
            .unwrap_or_else(|| Arc::new(SystemClock::default()));
        InMemoryQueue::from_parts(self, clock)
    }
}
