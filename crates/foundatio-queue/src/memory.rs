//! In-memory work queue.

use crate::config::InMemoryQueueBuilder;
use crate::error::QueueError;
use crate::events::QueueEvent;
use crate::queue::{Queue, QueueEntry, QueueStats, WorkItemHandler, DEFAULT_DEQUEUE_TIMEOUT};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use foundatio_core::clock::Clock;
use foundatio_core::events::EventListeners;
use foundatio_core::timer::MaintenanceTimer;
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct EntryData<T> {
    id: Uuid,
    value: T,
    enqueued_at: DateTime<Utc>,
    attempts: u32,
    lease_expires: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
    deadlettered_at: Option<DateTime<Utc>>,
}

/// Ownership model: an entry lives in exactly one of these collections at
/// any instant; transitions move the entry under the queue-level mutex.
struct State<T> {
    ready: VecDeque<EntryData<T>>,
    scheduled: Vec<EntryData<T>>,
    working: HashMap<Uuid, EntryData<T>>,
    deadletter: VecDeque<EntryData<T>>,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            ready: VecDeque::new(),
            scheduled: Vec::new(),
            working: HashMap::new(),
            deadletter: VecDeque::new(),
        }
    }
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
}

pub(crate) struct QueueInner<T> {
    name: String,
    retries: u32,
    retry_delay: Duration,
    retry_multipliers: Vec<u32>,
    max_retry_delay: Duration,
    work_item_timeout: Duration,
    dead_letter_max_items: usize,
    dead_letter_ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<State<T>>,
    notify: Notify,
    counters: Counters,
    events: EventListeners<QueueEvent>,
}

/// FIFO in-memory queue with leases, bounded retries and a deadletter list.
///
/// Cloning yields another handle to the same queue.
///
/// # Examples
///
/// ```
/// use foundatio_queue::{InMemoryQueue, Queue};
/// use tokio_util::sync::CancellationToken;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), foundatio_queue::QueueError> {
/// let queue: InMemoryQueue<String> = InMemoryQueue::new();
/// queue.enqueue("job".to_string()).await?;
///
/// let entry = queue
///     .dequeue(Some(Duration::from_millis(100)), CancellationToken::new())
///     .await?
///     .expect("item is ready");
/// queue.complete(entry.id()).await?;
/// # Ok(())
/// # }
/// ```
pub struct InMemoryQueue<T> {
    inner: Arc<QueueInner<T>>,
    maintenance: Arc<MaintenanceTimer>,
}

impl<T> Clone for InMemoryQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            maintenance: Arc::clone(&self.maintenance),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for InMemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> InMemoryQueue<T> {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InMemoryQueueBuilder {
        InMemoryQueueBuilder::new()
    }

    pub(crate) fn from_parts(builder: InMemoryQueueBuilder, clock: Arc<dyn Clock>) -> Self {
        let inner = Arc::new(QueueInner {
            name: builder.name,
            retries: builder.retries,
            retry_delay: builder.retry_delay,
            retry_multipliers: builder.retry_multipliers,
            max_retry_delay: builder.max_retry_delay,
            work_item_timeout: builder.work_item_timeout,
            dead_letter_max_items: builder.dead_letter_max_items,
            dead_letter_ttl: builder.dead_letter_ttl,
            clock: Arc::clone(&clock),
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            counters: Counters::default(),
            events: EventListeners::new(),
        });

        let maintenance = {
            let inner = Arc::clone(&inner);
            MaintenanceTimer::new(
                clock,
                Arc::new(move || {
                    let inner = Arc::clone(&inner);
                    Box::pin(async move { inner.run_maintenance() })
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

    /// Listener registry for queue lifecycle events.
    pub fn events(&self) -> &EventListeners<QueueEvent> {
        &self.inner.events
    }
}

impl<T: Clone + Send + Sync + 'static> QueueInner<T> {
    fn emit(&self, event: QueueEvent) {
        self.events.emit(&event);
    }

    /// Computes the retry delay applied after `attempts` deliveries.
    fn retry_delay_for(&self, attempts: u32) -> Duration {
        if self.retry_delay.is_zero() {
            return Duration::ZERO;
        }
        let index = (attempts.saturating_sub(1) as usize).min(self.retry_multipliers.len() - 1);
        let delay = self
            .retry_delay
            .saturating_mul(self.retry_multipliers[index]);
        delay.min(self.max_retry_delay)
    }

    /// Applies due transitions and reports the earliest future deadline.
    fn run_maintenance(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let mut woken = 0usize;
        let mut timeouts = 0u64;

        let next = {
            let mut state = self.state.lock().unwrap();

            // Scheduled retries whose delay has elapsed rejoin the ready
            // list in due order.
            let mut due: Vec<EntryData<T>> = Vec::new();
            state.scheduled.retain(|entry| {
                if entry.due.is_some_and(|at| at <= now) {
                    due.push(entry.clone());
                    false
                } else {
                    true
                }
            });
            due.sort_by_key(|entry| entry.due);
            for mut entry in due {
                entry.due = None;
                state.ready.push_back(entry);
                woken += 1;
            }

            // Expired leases: the holder is presumed dead. The attempt
            // count stays as-is; it only rises on the next dequeue.
            let expired: Vec<Uuid> = state
                .working
                .iter()
                .filter(|(_, entry)| entry.lease_expires.is_some_and(|at| at <= now))
                .map(|(id, _)| *id)
                .collect();
            for id in expired {
                if let Some(mut entry) = state.working.remove(&id) {
                    entry.lease_expires = None;
                    timeouts += 1;
                    if entry.attempts > self.retries {
                        entry.deadlettered_at = Some(now);
                        push_deadletter(&mut state, entry, self.dead_letter_max_items);
                    } else {
                        state.ready.push_back(entry);
                        woken += 1;
                    }
                }
            }

            // Deadletter retention.
            let ttl = TimeDelta::from_std(self.dead_letter_ttl).unwrap_or(TimeDelta::MAX);
            state
                .deadletter
                .retain(|entry| entry.deadlettered_at.is_some_and(|at| at + ttl > now));

            next_deadline(&state, ttl)
        };

        if timeouts > 0 {
            self.counters.timeouts.fetch_add(timeouts, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::debug!(queue = %self.name, count = timeouts, "work item leases expired");
        }
        for _ in 0..woken {
            self.notify.notify_one();
        }
        next
    }
}

fn push_deadletter<T>(state: &mut State<T>, entry: EntryData<T>, cap: usize) {
    state.deadletter.push_back(entry);
    while state.deadletter.len() > cap {
        state.deadletter.pop_front();
    }
}

fn next_deadline<T>(state: &State<T>, dead_letter_ttl: TimeDelta) -> Option<DateTime<Utc>> {
    let scheduled = state.scheduled.iter().filter_map(|entry| entry.due);
    let leases = state.working.values().filter_map(|entry| entry.lease_expires);
    let retention = state
        .deadletter
        .iter()
        .filter_map(|entry| entry.deadlettered_at.map(|at| at + dead_letter_ttl));
    scheduled.chain(leases).chain(retention).min()
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> Queue<T> for InMemoryQueue<T> {
    async fn enqueue(&self, item: T) -> Result<Uuid, QueueError> {
        let inner = &self.inner;
        let id = Uuid::new_v4();
        let now = inner.clock.now();

        {
            let mut state = inner.state.lock().unwrap();
            state.ready.push_back(EntryData {
                id,
                value: item,
                enqueued_at: now,
                attempts: 0,
                lease_expires: None,
                due: None,
                deadlettered_at: None,
            });
        }

        inner.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("queue_enqueued_total", "queue" => inner.name.clone()).increment(1);
        #[cfg(feature = "tracing")]
        tracing::trace!(queue = %inner.name, %id, "enqueued");

        inner.emit(QueueEvent::Enqueued {
            queue_name: inner.name.clone(),
            timestamp: Instant::now(),
            id,
        });
        inner.notify.notify_one();
        Ok(id)
    }

    async fn dequeue(
        &self,
        timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Result<Option<QueueEntry<T>>, QueueError> {
        let inner = &self.inner;
        let timeout = timeout.unwrap_or(DEFAULT_DEQUEUE_TIMEOUT);
        let started = inner.clock.monotonic();

        loop {
            if token.is_cancelled() {
                return Ok(None);
            }

            let notified = inner.notify.notified();

            let dequeued = {
                let mut state = inner.state.lock().unwrap();
                state.ready.pop_front().map(|mut entry| {
                    entry.attempts += 1;
                    let lease = inner.clock.now()
                        + TimeDelta::from_std(inner.work_item_timeout).unwrap_or(TimeDelta::MAX);
                    entry.lease_expires = Some(lease);
                    let handed_out = QueueEntry::new(
                        entry.id,
                        entry.value.clone(),
                        entry.attempts,
                        entry.enqueued_at,
                    );
                    state.working.insert(entry.id, entry);
                    (handed_out, lease)
                })
            };

            if let Some((entry, lease)) = dequeued {
                inner.counters.dequeued.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "metrics")]
                metrics::counter!("queue_dequeued_total", "queue" => inner.name.clone())
                    .increment(1);
                inner.emit(QueueEvent::Dequeued {
                    queue_name: inner.name.clone(),
                    timestamp: Instant::now(),
                    id: entry.id(),
                    attempts: entry.attempts(),
                });
                self.maintenance.schedule_next(lease);
                return Ok(Some(entry));
            }

            let elapsed = inner.clock.monotonic().saturating_sub(started);
            if elapsed >= timeout {
                return Ok(None);
            }
            let remaining = timeout - elapsed;

            tokio::select! {
                _ = notified => {}
                _ = inner.clock.sleep(remaining) => {}
                _ = token.cancelled() => return Ok(None),
            }
        }
    }

    async fn complete(&self, id: Uuid) -> Result<bool, QueueError> {
        let inner = &self.inner;
        let removed = {
            let mut state = inner.state.lock().unwrap();
            state.working.remove(&id)
        };

        let Some(_entry) = removed else {
            return Ok(false);
        };

        inner.counters.completed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("queue_completed_total", "queue" => inner.name.clone()).increment(1);
        #[cfg(feature = "tracing")]
        tracing::trace!(queue = %inner.name, %id, "completed");

        inner.emit(QueueEvent::Completed {
            queue_name: inner.name.clone(),
            timestamp: Instant::now(),
            id,
        });
        Ok(true)
    }

    async fn abandon(&self, id: Uuid) -> Result<bool, QueueError> {
        enum Disposition {
            Ready,
            Scheduled(DateTime<Utc>),
            Deadletter(DateTime<Utc>),
        }

        let inner = &self.inner;
        let now = inner.clock.now();

        let disposition = {
            let mut state = inner.state.lock().unwrap();
            let Some(mut entry) = state.working.remove(&id) else {
                return Ok(false);
            };
            entry.lease_expires = None;

            if entry.attempts > inner.retries {
                entry.deadlettered_at = Some(now);
                push_deadletter(&mut state, entry, inner.dead_letter_max_items);
                let retention =
                    now + TimeDelta::from_std(inner.dead_letter_ttl).unwrap_or(TimeDelta::MAX);
                Disposition::Deadletter(retention)
            } else {
                let delay = inner.retry_delay_for(entry.attempts);
                if delay.is_zero() {
                    state.ready.push_back(entry);
                    Disposition::Ready
                } else {
                    let due = now + TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
                    entry.due = Some(due);
                    state.scheduled.push(entry);
                    Disposition::Scheduled(due)
                }
            }
        };

        inner.counters.abandoned.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        metrics::counter!("queue_abandoned_total", "queue" => inner.name.clone()).increment(1);
        #[cfg(feature = "tracing")]
        tracing::debug!(queue = %inner.name, %id, "abandoned");

        inner.emit(QueueEvent::Abandoned {
            queue_name: inner.name.clone(),
            timestamp: Instant::now(),
            id,
        });

        match disposition {
            Disposition::Ready => inner.notify.notify_one(),
            Disposition::Scheduled(due) => self.maintenance.schedule_next(due),
            Disposition::Deadletter(retention) => self.maintenance.schedule_next(retention),
        }
        Ok(true)
    }

    async fn renew_lock(&self, id: Uuid) -> Result<bool, QueueError> {
        let inner = &self.inner;
        let now = inner.clock.now();

        let mut state = inner.state.lock().unwrap();
        let Some(entry) = state.working.get_mut(&id) else {
            return Ok(false);
        };
        if entry.lease_expires.is_some_and(|at| at <= now) {
            // Already expired; maintenance will reclaim it.
            return Ok(false);
        }
        entry.lease_expires =
            Some(now + TimeDelta::from_std(inner.work_item_timeout).unwrap_or(TimeDelta::MAX));
        Ok(true)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let inner = &self.inner;
        let (queued, working, deadletter) = {
            let state = inner.state.lock().unwrap();
            (
                (state.ready.len() + state.scheduled.len()) as u64,
                state.working.len() as u64,
                state.deadletter.len() as u64,
            )
        };
        Ok(QueueStats {
            queued,
            working,
            deadletter,
            enqueued: inner.counters.enqueued.load(Ordering::Relaxed),
            dequeued: inner.counters.dequeued.load(Ordering::Relaxed),
            completed: inner.counters.completed.load(Ordering::Relaxed),
            abandoned: inner.counters.abandoned.load(Ordering::Relaxed),
            errors: inner.counters.errors.load(Ordering::Relaxed),
            timeouts: inner.counters.timeouts.load(Ordering::Relaxed),
        })
    }

    async fn deadletter_items(&self) -> Result<Vec<T>, QueueError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .deadletter
            .iter()
            .map(|entry| entry.value.clone())
            .collect())
    }

    async fn start_working(
        &self,
        handler: WorkItemHandler<T>,
        auto_complete: bool,
        worker_count: usize,
        token: CancellationToken,
    ) -> Result<(), QueueError> {
        for _worker in 0..worker_count.max(1) {
            let queue = self.clone();
            let handler = Arc::clone(&handler);
            let token = token.clone();

            tokio::spawn(async move {
                #[cfg(feature = "tracing")]
                tracing::debug!(queue = %queue.inner.name, worker = _worker, "queue worker started");

                loop {
                    if token.is_cancelled() {
                        break;
                    }
                    let entry = match queue.dequeue(None, token.clone()).await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => continue,
                        Err(_) => break,
                    };
                    let id = entry.id();

                    let outcome = std::panic::AssertUnwindSafe(handler(entry, token.clone()))
                        .catch_unwind()
                        .await;

                    match outcome {
                        Ok(Ok(())) => {
                            if auto_complete && queue.complete(id).await.is_err() {
                                queue.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Ok(Err(_err)) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(queue = %queue.inner.name, %id, error = %_err, "work item handler failed");
                            if queue.abandon(id).await.is_err() {
                                queue.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        Err(_) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(queue = %queue.inner.name, %id, "work item handler panicked");
                            if queue.abandon(id).await.is_err() {
                                queue.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(queue = %queue.inner.name, worker = _worker, "queue worker stopped");
            });
        }
        Ok(())
    }
}
