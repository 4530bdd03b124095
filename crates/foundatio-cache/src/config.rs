use crate::memory::InMemoryCacheClient;
use foundatio_core::clock::{Clock, SystemClock};
use std::sync::Arc;

/// Builder for [`InMemoryCacheClient`].
///
/// Defaults:
/// - name: `"in-memory"`
/// - max_items: unbounded
/// - clock: [`SystemClock`]
pub struct InMemoryCacheClientBuilder {
    name: String,
    max_items: Option<usize>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for InMemoryCacheClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheClientBuilder {
    pub fn new() -> Self {
        Self {
            name: "in-memory".to_string(),
            max_items: None,
            clock: None,
        }
    }

    /// Sets the instance name used in expiration events.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Caps the number of entries; exceeding the cap evicts the entry with
    /// the oldest last access (ties broken by creation order).
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Injects a time source; tests pass a `TestClock`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> InMemoryCacheClient {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::default()));
        InMemoryCacheClient::from_parts(self.name, clock, self.max_items)
    }
}
