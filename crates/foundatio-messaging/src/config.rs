use crate::memory::InMemoryMessageBus;
use foundatio_core::clock::{Clock, SystemClock};
use std::sync::Arc;

/// Builder for [`InMemoryMessageBus`].
pub struct InMemoryMessageBusBuilder {
    name: String,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for InMemoryMessageBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageBusBuilder {
    pub fn new() -> Self {
        Self {
            name: "in-memory".to_string(),
            clock: None,
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Injects a time source; delayed publication follows this clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> InMemoryMessageBus {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::default()));
        InMemoryMessageBus::from_parts(self.name, clock)
    }
}
