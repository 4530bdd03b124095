//! In-memory message bus.

use crate::bus::{ErasedHandler, MessageBus, MessagePayload, SubscriptionId};
use crate::config::InMemoryMessageBusBuilder;
use crate::error::MessagingError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use foundatio_core::clock::Clock;
use foundatio_core::timer::MaintenanceTimer;
use futures::FutureExt;
use std::any::{Any, TypeId};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct Subscription {
    id: SubscriptionId,
    type_id: TypeId,
    sender: mpsc::UnboundedSender<Arc<dyn Any + Send + Sync>>,
    cancellation: CancellationToken,
}

struct DelayedEntry {
    due: DateTime<Utc>,
    seq: u64,
    payload: MessagePayload,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.due, self.seq) == (other.due, other.seq)
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

pub(crate) struct BusInner {
    name: String,
    clock: Arc<dyn Clock>,
    subscriptions: Mutex<Vec<Subscription>>,
    delayed: Mutex<BinaryHeap<Reverse<DelayedEntry>>>,
    delayed_seq: AtomicU64,
    shutdown: CancellationToken,
}

/// Type-routed in-process publish/subscribe.
///
/// Every live subscription whose registered type matches a published
/// message receives its own copy, delivered sequentially by a dedicated
/// worker task so a slow handler only ever delays its own subscription.
///
/// # Examples
///
/// ```
/// use foundatio_messaging::{InMemoryMessageBus, MessageBusExt};
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Debug, Clone)]
/// struct OrderPlaced { order_id: u64 }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), foundatio_messaging::MessagingError> {
/// let bus = InMemoryMessageBus::new();
///
/// bus.subscribe::<OrderPlaced, _, _>(
///     |message, _token| async move {
///         println!("order {}", message.order_id);
///     },
///     CancellationToken::new(),
/// )
/// .await?;
///
/// bus.publish(OrderPlaced { order_id: 7 }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryMessageBus {
    inner: Arc<BusInner>,
    maintenance: Arc<MaintenanceTimer>,
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InMemoryMessageBusBuilder {
        InMemoryMessageBusBuilder::new()
    }

    pub(crate) fn from_parts(name: String, clock: Arc<dyn Clock>) -> Self {
        let inner = Arc::new(BusInner {
            name,
            clock: Arc::clone(&clock),
            subscriptions: Mutex::new(Vec::new()),
            delayed: Mutex::new(BinaryHeap::new()),
            delayed_seq: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });

        let maintenance = {
            let inner = Arc::clone(&inner);
            MaintenanceTimer::new(
                clock,
                Arc::new(move || {
                    let inner = Arc::clone(&inner);
                    Box::pin(async move { inner.publish_due() })
                }),
            )
        };

        Self {
            inner,
            maintenance: Arc::new(maintenance),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        let subs = self.inner.subscriptions.lock().unwrap();
        subs.iter()
            .filter(|s| !s.cancellation.is_cancelled())
            .count()
    }

    /// Stops delivery and drops any pending delayed messages.
    pub fn dispose(&self) {
        self.inner.shutdown.cancel();
        self.maintenance.stop();
        self.inner.delayed.lock().unwrap().clear();
        self.inner.subscriptions.lock().unwrap().clear();
    }
}

impl BusInner {
    /// Hands the payload to every matching subscription's channel. Dead
    /// subscriptions discovered along the way are dropped.
    fn deliver(&self, payload: &MessagePayload) {
        let senders: Vec<_> = {
            let mut subs = self.subscriptions.lock().unwrap();
            subs.retain(|s| !s.cancellation.is_cancelled() && !s.sender.is_closed());
            subs.iter()
                .filter(|s| s.type_id == payload.type_id())
                .map(|s| s.sender.clone())
                .collect()
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(
            bus = %self.name,
            message_type = payload.type_name(),
            subscribers = senders.len(),
            "delivering message"
        );

        for sender in senders {
            let _ = sender.send(payload.body());
        }
    }

    /// Publishes every delayed message whose due time has passed; returns
    /// the due time of the next pending message, if any.
    fn publish_due(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        loop {
            let entry = {
                let mut delayed = self.delayed.lock().unwrap();
                match delayed.peek() {
                    Some(Reverse(head)) if head.due <= now => {}
                    Some(Reverse(head)) => return Some(head.due),
                    None => return None,
                }
                delayed.pop().map(|Reverse(entry)| entry)
            };
            if let Some(entry) = entry {
                self.deliver(&entry.payload);
            }
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish_payload(
        &self,
        payload: MessagePayload,
        delay: Option<Duration>,
    ) -> Result<(), MessagingError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(MessagingError::Disposed);
        }

        match delay.filter(|d| *d > Duration::ZERO) {
            Some(delay) => {
                let due =
                    self.inner.clock.now() + TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
                let seq = self.inner.delayed_seq.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    bus = %self.inner.name,
                    message_type = payload.type_name(),
                    delay_ms = delay.as_millis() as u64,
                    "deferring message"
                );
                self.inner
                    .delayed
                    .lock()
                    .unwrap()
                    .push(Reverse(DelayedEntry { due, seq, payload }));
                self.maintenance.schedule_next(due);
            }
            None => self.inner.deliver(&payload),
        }
        Ok(())
    }

    async fn subscribe_erased(
        &self,
        type_id: TypeId,
        handler: ErasedHandler,
        cancellation: CancellationToken,
    ) -> Result<SubscriptionId, MessagingError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(MessagingError::Disposed);
        }

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        {
            let mut subs = self.inner.subscriptions.lock().unwrap();
            subs.push(Subscription {
                id,
                type_id,
                sender,
                cancellation: cancellation.clone(),
            });
        }

        let shutdown = self.inner.shutdown.clone();
        #[cfg(feature = "tracing")]
        let bus_name = self.inner.name.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = receiver.recv() => {
                        let Some(body) = maybe else { break };
                        if cancellation.is_cancelled() {
                            break;
                        }
                        let invocation = std::panic::AssertUnwindSafe(handler(
                            body,
                            cancellation.clone(),
                        ))
                        .catch_unwind();
                        if invocation.await.is_err() {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(bus = %bus_name, "message handler panicked");
                        }
                    }
                    _ = cancellation.cancelled() => break,
                    _ = shutdown.cancelled() => break,
                }
            }
        });

        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, MessagingError> {
        let mut subs = self.inner.subscriptions.lock().unwrap();
        let before = subs.len();
        subs.retain(|s| {
            if s.id == id {
                s.cancellation.cancel();
                false
            } else {
                true
            }
        });
        Ok(subs.len() != before)
    }
}
