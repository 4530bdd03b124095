//! Work queue building block for foundatio.
//!
//! A FIFO queue with at-least-once delivery: dequeued items carry a lease
//! (visibility timeout) and must be completed or abandoned; abandoned items
//! retry with a configurable delay schedule until their retry budget is
//! spent, after which they land in a capped, retained deadletter list. A
//! single rearmable maintenance timer applies scheduled retries, lease
//! expirations and deadletter retention at the earliest pending deadline.
//!
//! The [`Queue`] trait is the seam remote backends (SQS, Redis, Service
//! Bus) implement; [`InMemoryQueue`] is the local implementation. The
//! worker pump ([`Queue::start_working`]) runs a configurable number of
//! cooperative workers over the dequeue → handle → complete/abandon loop.

mod config;
mod error;
mod events;
mod memory;
mod queue;

pub use config::InMemoryQueueBuilder;
pub use error::QueueError;
pub use events::QueueEvent;
pub use memory::InMemoryQueue;
pub use queue::{
    work_item_handler, Queue, QueueEntry, QueueStats, WorkItemHandler, DEFAULT_DEQUEUE_TIMEOUT,
};
