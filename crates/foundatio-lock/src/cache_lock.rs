//! Named mutex built on a cache and a message bus.
//!
//! A lock is a cache entry `lock:<resource>` holding a random fencing
//! token with a TTL. Acquisition is `add` (create-if-absent); contention
//! waits on a [`LockReleased`] bus notification raced against the holder's
//! remaining TTL. Release is compare-and-delete on the fencing token, so a
//! stale release can never evict the current holder.

use crate::error::LockError;
use crate::lock::{
    Lock, LockProvider, LockReleased, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_TIME_UNTIL_EXPIRES,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foundatio_cache::{CacheClient, CacheValue};
use foundatio_core::clock::{Clock, SystemClock};
use foundatio_messaging::{MessageBus, MessageBusExt, SubscriptionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, OnceCell};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn lock_key(resource: &str) -> String {
    format!("lock:{resource}")
}

/// Lock provider coordinating through a shared cache plus release
/// notifications over a message bus.
pub struct CacheLockProvider {
    cache: Arc<dyn CacheClient>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
    waiters: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
    subscription: OnceCell<SubscriptionId>,
}

impl CacheLockProvider {
    pub fn new(cache: Arc<dyn CacheClient>, bus: Arc<dyn MessageBus>) -> Self {
        Self::with_clock(cache, bus, Arc::new(SystemClock::default()))
    }

    pub fn with_clock(
        cache: Arc<dyn CacheClient>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            bus,
            clock,
            waiters: Arc::new(Mutex::new(HashMap::new())),
            subscription: OnceCell::new(),
        }
    }

    fn waiter(&self, resource: &str) -> Arc<Notify> {
        let mut waiters = self.waiters.lock().unwrap();
        Arc::clone(
            waiters
                .entry(resource.to_string())
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    /// Subscribes to release notifications exactly once per provider.
    async fn ensure_subscription(&self) -> Result<(), LockError> {
        let waiters = Arc::clone(&self.waiters);
        let bus = Arc::clone(&self.bus);
        self.subscription
            .get_or_try_init(|| async move {
                bus.subscribe::<LockReleased, _, _>(
                    move |message, _| {
                        let waiters = Arc::clone(&waiters);
                        async move {
                            let notify = waiters.lock().unwrap().get(&message.resource).cloned();
                            if let Some(notify) = notify {
                                notify.notify_waiters();
                            }
                        }
                    },
                    CancellationToken::new(),
                )
                .await
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LockProvider for CacheLockProvider {
    async fn acquire(
        &self,
        resource: &str,
        time_until_expires: Option<Duration>,
        acquire_timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Result<Option<Box<dyn Lock>>, LockError> {
        let ttl = time_until_expires.unwrap_or(DEFAULT_TIME_UNTIL_EXPIRES);
        let timeout = acquire_timeout.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT);
        let key = lock_key(resource);
        let lock_id = Uuid::new_v4().to_string();
        let value = CacheValue::from(lock_id.clone());
        let started = self.clock.monotonic();

        let make_lock = |time_waited: Duration| -> Box<dyn Lock> {
            Box::new(CacheLock {
                cache: Arc::clone(&self.cache),
                bus: Arc::clone(&self.bus),
                resource: resource.to_string(),
                key: key.clone(),
                lock_id: lock_id.clone(),
                ttl,
                acquired_at: self.clock.now(),
                time_waited,
                renewal_count: AtomicUsize::new(0),
                released: AtomicBool::new(false),
            })
        };

        if token.is_cancelled() {
            return Ok(None);
        }
        if self.cache.add_value(&key, value.clone(), Some(ttl)).await? {
            return Ok(Some(make_lock(Duration::ZERO)));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(resource, "lock contended, waiting for release or expiry");

        self.ensure_subscription().await?;
        let notify = self.waiter(resource);

        loop {
            let notified = notify.notified();

            if self.cache.add_value(&key, value.clone(), Some(ttl)).await? {
                let waited = self.clock.monotonic().saturating_sub(started);
                return Ok(Some(make_lock(waited)));
            }

            if token.is_cancelled() {
                return Ok(None);
            }
            let elapsed = self.clock.monotonic().saturating_sub(started);
            if elapsed >= timeout {
                #[cfg(feature = "tracing")]
                tracing::debug!(resource, "lock acquisition timed out");
                return Ok(None);
            }
            let remaining = timeout - elapsed;

            // Wait no longer than the current holder's remaining TTL; when
            // the entry is already gone, retry immediately.
            let wait = match self.cache.get_expiration(&key).await? {
                Some(expires_at) => {
                    let until_expiry = (expires_at - self.clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    remaining.min(until_expiry)
                }
                None => continue,
            };

            tokio::select! {
                _ = notified => {}
                _ = self.clock.sleep(wait) => {}
                _ = token.cancelled() => return Ok(None),
            }
        }
    }

    async fn is_locked(&self, resource: &str) -> Result<bool, LockError> {
        Ok(self.cache.exists(&lock_key(resource)).await?)
    }
}

struct CacheLock {
    cache: Arc<dyn CacheClient>,
    bus: Arc<dyn MessageBus>,
    resource: String,
    key: String,
    lock_id: String,
    ttl: Duration,
    acquired_at: DateTime<Utc>,
    time_waited: Duration,
    renewal_count: AtomicUsize,
    released: AtomicBool,
}

#[async_trait]
impl Lock for CacheLock {
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
        self.renewal_count.load(Ordering::SeqCst)
    }

    async fn release(&self) -> Result<(), LockError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Compare-and-delete: only our own entry is ever removed. The
        // notification goes out either way so waiters re-check.
        let removed = self
            .cache
            .remove_if_equal(&self.key, &CacheValue::from(self.lock_id.clone()))
            .await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(resource = %self.resource, removed, "releasing lock");
        #[cfg(not(feature = "tracing"))]
        let _ = removed;

        self.bus
            .publish(LockReleased {
                resource: self.resource.clone(),
            })
            .await?;
        Ok(())
    }

    async fn renew(&self, time_until_expires: Option<Duration>) -> Result<bool, LockError> {
        let ttl = time_until_expires.unwrap_or(self.ttl);
        let current = CacheValue::from(self.lock_id.clone());
        let renewed = self
            .cache
            .replace_if_equal(&self.key, &current, current.clone(), Some(ttl))
            .await?;
        if renewed {
            self.renewal_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(renewed)
    }
}
