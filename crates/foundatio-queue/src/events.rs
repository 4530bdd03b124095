use foundatio_core::events::Event;
use std::time::Instant;
use uuid::Uuid;

/// Queue lifecycle events.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Enqueued {
        queue_name: String,
        timestamp: Instant,
        id: Uuid,
    },
    Dequeued {
        queue_name: String,
        timestamp: Instant,
        id: Uuid,
        attempts: u32,
    },
    Completed {
        queue_name: String,
        timestamp: Instant,
        id: Uuid,
    },
    Abandoned {
        queue_name: String,
        timestamp: Instant,
        id: Uuid,
    },
}

impl QueueEvent {
    /// The affected entry.
    pub fn id(&self) -> Uuid {
        match self {
            QueueEvent::Enqueued { id, .. }
            | QueueEvent::Dequeued { id, .. }
            | QueueEvent::Completed { id, .. }
            | QueueEvent::Abandoned { id, .. } => *id,
        }
    }
}

impl Event for QueueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued { .. } => "enqueued",
            QueueEvent::Dequeued { .. } => "dequeued",
            QueueEvent::Completed { .. } => "completed",
            QueueEvent::Abandoned { .. } => "abandoned",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            QueueEvent::Enqueued { timestamp, .. }
            | QueueEvent::Dequeued { timestamp, .. }
            | QueueEvent::Completed { timestamp, .. }
            | QueueEvent::Abandoned { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            QueueEvent::Enqueued { queue_name, .. }
            | QueueEvent::Dequeued { queue_name, .. }
            | QueueEvent::Completed { queue_name, .. }
            | QueueEvent::Abandoned { queue_name, .. } => queue_name,
        }
    }
}
