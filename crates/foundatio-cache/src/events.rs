use foundatio_core::events::Event;
use std::time::Instant;

/// Fired exactly once per entry when it is removed because its expiry
/// passed, whether the removal happened lazily on access or through the
/// maintenance sweep.
#[derive(Debug, Clone)]
pub struct ItemExpiredEvent {
    source: String,
    key: String,
    timestamp: Instant,
}

impl ItemExpiredEvent {
    pub(crate) fn new(source: String, key: String) -> Self {
        Self {
            source,
            key,
            timestamp: Instant::now(),
        }
    }

    /// The key that expired.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Event for ItemExpiredEvent {
    fn event_type(&self) -> &'static str {
        "item_expired"
    }

    fn timestamp(&self) -> Instant {
        self.timestamp
    }

    fn source(&self) -> &str {
        &self.source
    }
}
