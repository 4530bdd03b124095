//! The work queue contract.

use crate::error::QueueError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long `dequeue` waits for an item when the caller gives no timeout.
pub const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_secs(30);

/// A dequeued work item.
///
/// The holder has a lease until the queue's `work_item_timeout` elapses;
/// finish with [`Queue::complete`] or [`Queue::abandon`] (both keyed by
/// [`QueueEntry::id`]), or extend the lease with [`Queue::renew_lock`].
#[derive(Debug, Clone)]
pub struct QueueEntry<T> {
    id: Uuid,
    value: T,
    attempts: u32,
    enqueued_at: DateTime<Utc>,
}

impl<T> QueueEntry<T> {
    pub(crate) fn new(id: Uuid, value: T, attempts: u32, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            value,
            attempts,
            enqueued_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Number of times this item has been delivered, including this one.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items currently eligible for dequeue (ready plus scheduled retries).
    pub queued: u64,
    /// Items currently leased to a worker.
    pub working: u64,
    /// Items currently parked in the deadletter list.
    pub deadletter: u64,
    pub enqueued: u64,
    pub dequeued: u64,
    pub completed: u64,
    pub abandoned: u64,
    /// Failures while completing or abandoning on a worker's behalf.
    pub errors: u64,
    /// Leases that expired before the holder finished.
    pub timeouts: u64,
}

/// Handler invoked by the worker pump for each dequeued entry. An `Err`
/// abandons the entry.
pub type WorkItemHandler<T> = Arc<
    dyn Fn(
            QueueEntry<T>,
            CancellationToken,
        ) -> BoxFuture<'static, Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + Sync,
>;

/// FIFO work queue with visibility timeouts, bounded retries and a
/// deadletter list.
#[async_trait]
pub trait Queue<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Appends an item to the tail of the ready list and wakes one waiting
    /// dequeuer. Returns the entry id.
    async fn enqueue(&self, item: T) -> Result<Uuid, QueueError>;

    /// Pops the head of the ready list, waiting up to `timeout`
    /// ([`DEFAULT_DEQUEUE_TIMEOUT`] when `None`) for an enqueue signal.
    /// Returns `Ok(None)` on timeout or cancellation.
    async fn dequeue(
        &self,
        timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Result<Option<QueueEntry<T>>, QueueError>;

    /// Marks a working entry as done. Repeated calls (or calls after the
    /// lease expired) return false and change nothing.
    async fn complete(&self, id: Uuid) -> Result<bool, QueueError>;

    /// Returns a working entry to the queue: to the deadletter list when
    /// its retry budget is spent, to the scheduled list when a retry delay
    /// is configured, to the ready tail otherwise. Repeated calls return
    /// false.
    async fn abandon(&self, id: Uuid) -> Result<bool, QueueError>;

    /// Extends a working entry's lease. Returns false when the lease has
    /// already expired.
    async fn renew_lock(&self, id: Uuid) -> Result<bool, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Current deadletter payloads, oldest first.
    async fn deadletter_items(&self) -> Result<Vec<T>, QueueError>;

    /// Spawns `worker_count` cooperative workers running
    /// dequeue → handler → complete/abandon until `token` fires. With
    /// `auto_complete`, a handler that returns `Ok` has its entry
    /// completed; an `Err` always abandons.
    async fn start_working(
        &self,
        handler: WorkItemHandler<T>,
        auto_complete: bool,
        worker_count: usize,
        token: CancellationToken,
    ) -> Result<(), QueueError>;
}

/// Wraps a plain async closure as a [`WorkItemHandler`].
pub fn work_item_handler<T, F, Fut>(handler: F) -> WorkItemHandler<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(QueueEntry<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + 'static,
{
    Arc::new(move |entry, token| Box::pin(handler(entry, token)))
}
