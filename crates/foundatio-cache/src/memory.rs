//! In-memory cache client.

use crate::client::CacheClient;
use crate::config::InMemoryCacheClientBuilder;
use crate::error::CacheError;
use crate::events::ItemExpiredEvent;
use crate::value::CacheValue;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use foundatio_core::clock::Clock;
use foundatio_core::events::EventListeners;
use foundatio_core::timer::MaintenanceTimer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    expires_at: Option<DateTime<Utc>>,
    last_access: DateTime<Utc>,
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

pub(crate) struct Inner {
    name: String,
    clock: Arc<dyn Clock>,
    max_items: Option<usize>,
    state: Mutex<State>,
    item_expired: EventListeners<ItemExpiredEvent>,
}

/// Keyed in-memory store with TTL, atomic counters and expiration events.
///
/// Cloning yields another handle to the same store. A single short mutex
/// guards the backing map; it is never held across an await point or while
/// expiration listeners run.
///
/// # Examples
///
/// ```
/// use foundatio_cache::{CacheClientExt, InMemoryCacheClient};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), foundatio_cache::CacheError> {
/// let cache = InMemoryCacheClient::new();
/// cache.set("greeting", "hello", Some(Duration::from_secs(60))).await?;
/// let value: Option<String> = cache.get("greeting").await?;
/// assert_eq!(value.as_deref(), Some("hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryCacheClient {
    inner: Arc<Inner>,
    maintenance: Arc<MaintenanceTimer>,
}

impl Default for InMemoryCacheClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCacheClient {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> InMemoryCacheClientBuilder {
        InMemoryCacheClientBuilder::new()
    }

    pub(crate) fn from_parts(
        name: String,
        clock: Arc<dyn Clock>,
        max_items: Option<usize>,
    ) -> Self {
        let inner = Arc::new(Inner {
            name,
            clock: Arc::clone(&clock),
            max_items,
            state: Mutex::new(State::default()),
            item_expired: EventListeners::new(),
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

    /// Listener registry for entry expirations.
    pub fn item_expired(&self) -> &EventListeners<ItemExpiredEvent> {
        &self.inner.item_expired
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn emit_expired(&self, keys: Vec<String>) {
        self.inner.emit_expired(keys);
    }

    fn schedule(&self, expires_at: Option<DateTime<Utc>>) {
        if let Some(at) = expires_at {
            self.maintenance.schedule_next(at);
        }
    }
}

impl Inner {
    fn emit_expired(&self, keys: Vec<String>) {
        for key in keys {
            self.item_expired
                .emit(&ItemExpiredEvent::new(self.name.clone(), key));
        }
    }

    /// Removes every expired entry and reports the earliest remaining
    /// expiry so the timer can re-arm.
    fn run_maintenance(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let (expired, next) = {
            let mut state = self.state.lock().unwrap();
            let expired: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                state.entries.remove(key);
            }
            let next = state
                .entries
                .values()
                .filter_map(|entry| entry.expires_at)
                .min();
            (expired, next)
        };
        self.emit_expired(expired);
        next
    }

    fn expires_from_ttl(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|d| now + TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX))
    }

    /// Takes `key` out of the map when its expiry has passed, so callers
    /// observe a miss. Returns the key when an expiration event is owed.
    fn reap_if_expired(
        &self,
        state: &mut MutexGuard<'_, State>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if state.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            state.entries.remove(key);
            Some(key.to_string())
        } else {
            None
        }
    }

    fn insert_entry(
        &self,
        state: &mut MutexGuard<'_, State>,
        key: &str,
        value: CacheValue,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                last_access: now,
                seq,
            },
        );
        self.evict_over_cap(state);
    }

    /// Drops the least recently accessed entries (ties broken by oldest
    /// creation sequence) until the configured cap is respected.
    fn evict_over_cap(&self, state: &mut MutexGuard<'_, State>) {
        let Some(max_items) = self.max_items else {
            return;
        };
        while state.entries.len() > max_items {
            let victim = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.last_access, entry.seq))
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    state.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        Err(CacheError::EmptyKey)
    } else {
        Ok(())
    }
}

#[async_trait]
impl CacheClient for InMemoryCacheClient {
    async fn set_value(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = inner.expires_from_ttl(now, ttl);

        let expired = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            if matches!(expires_at, Some(at) if at <= now) {
                // A zero or negative TTL never stores anything.
                state.entries.remove(key);
            } else {
                inner.insert_entry(&mut state, key, value, expires_at, now);
            }
            expired
        };

        self.emit_expired(expired.into_iter().collect());
        self.schedule(expires_at);
        Ok(())
    }

    async fn add_value(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = inner.expires_from_ttl(now, ttl);

        let (added, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            if state.entries.contains_key(key) {
                (false, expired)
            } else {
                inner.insert_entry(&mut state, key, value, expires_at, now);
                (true, expired)
            }
        };

        self.emit_expired(expired.into_iter().collect());
        if added {
            self.schedule(expires_at);
        }
        Ok(added)
    }

    async fn replace_value(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = inner.expires_from_ttl(now, ttl);

        let (replaced, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            match state.entries.get_mut(key) {
                Some(entry) => {
                    entry.value = value;
                    entry.expires_at = expires_at;
                    entry.last_access = now;
                    (true, expired)
                }
                None => (false, expired),
            }
        };

        self.emit_expired(expired.into_iter().collect());
        if replaced {
            self.schedule(expires_at);
        }
        Ok(replaced)
    }

    async fn replace_if_equal(
        &self,
        key: &str,
        expected: &CacheValue,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = inner.expires_from_ttl(now, ttl);

        let (replaced, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            match state.entries.get_mut(key) {
                Some(entry) if entry.value == *expected => {
                    entry.value = value;
                    entry.expires_at = expires_at;
                    entry.last_access = now;
                    (true, expired)
                }
                _ => (false, expired),
            }
        };

        self.emit_expired(expired.into_iter().collect());
        if replaced {
            self.schedule(expires_at);
        }
        Ok(replaced)
    }

    async fn get_value(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();

        let (value, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            let value = state.entries.get_mut(key).map(|entry| {
                entry.last_access = now;
                entry.value.clone()
            });
            (value, expired)
        };

        self.emit_expired(expired.into_iter().collect());
        Ok(value)
    }

    async fn get_values(&self, keys: &[&str]) -> Result<HashMap<String, CacheValue>, CacheError> {
        let inner = &self.inner;
        let now = inner.clock.now();

        let (hits, expired) = {
            let mut state = inner.state.lock().unwrap();
            let mut hits = HashMap::new();
            let mut expired = Vec::new();
            for &key in keys {
                if let Some(reaped) = inner.reap_if_expired(&mut state, key, now) {
                    expired.push(reaped);
                    continue;
                }
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.last_access = now;
                    hits.insert(key.to_string(), entry.value.clone());
                }
            }
            (hits, expired)
        };

        self.emit_expired(expired);
        Ok(hits)
    }

    async fn set_values(
        &self,
        values: Vec<(String, CacheValue)>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        for (key, _) in &values {
            validate_key(key)?;
        }
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = inner.expires_from_ttl(now, ttl);

        let expired = {
            let mut state = inner.state.lock().unwrap();
            let mut expired = Vec::new();
            for (key, value) in values {
                expired.extend(inner.reap_if_expired(&mut state, &key, now));
                inner.insert_entry(&mut state, &key, value, expires_at, now);
            }
            expired
        };

        self.emit_expired(expired);
        self.schedule(expires_at);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();

        let (removed, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            (
                expired.is_none() && state.entries.remove(key).is_some(),
                expired,
            )
        };

        self.emit_expired(expired.into_iter().collect());
        Ok(removed)
    }

    async fn remove_if_equal(&self, key: &str, expected: &CacheValue) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();

        let (removed, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            let matches = state
                .entries
                .get(key)
                .is_some_and(|entry| entry.value == *expected);
            if matches {
                state.entries.remove(key);
            }
            (matches, expired)
        };

        self.emit_expired(expired.into_iter().collect());
        Ok(removed)
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let inner = &self.inner;
        let now = inner.clock.now();

        let (removed, expired) = {
            let mut state = inner.state.lock().unwrap();
            let mut expired = Vec::new();
            let mut matched = Vec::new();
            for (key, entry) in state.entries.iter() {
                if entry.is_expired(now) {
                    expired.push(key.clone());
                } else if key.starts_with(prefix) {
                    matched.push(key.clone());
                }
            }
            for key in expired.iter().chain(matched.iter()) {
                state.entries.remove(key);
            }
            (matched.len(), expired)
        };

        self.emit_expired(expired);
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut state = self.inner.state.lock().unwrap();
        let count = state.entries.len();
        state.entries.clear();
        Ok(count)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();

        let (exists, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            (state.entries.contains_key(key), expired)
        };

        self.emit_expired(expired.into_iter().collect());
        Ok(exists)
    }

    async fn count(&self) -> Result<usize, CacheError> {
        let now = self.inner.clock.now();
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count())
    }

    async fn get_expiration(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();

        let (expiration, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            (
                state.entries.get(key).and_then(|entry| entry.expires_at),
                expired,
            )
        };

        self.emit_expired(expired.into_iter().collect());
        Ok(expiration)
    }

    async fn set_expiration(
        &self,
        key: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();

        let (updated, expired) = {
            let mut state = inner.state.lock().unwrap();
            let mut expired = Vec::new();
            expired.extend(inner.reap_if_expired(&mut state, key, now));
            let updated = if state.entries.contains_key(key) {
                if expires_at <= now {
                    state.entries.remove(key);
                    expired.push(key.to_string());
                } else if let Some(entry) = state.entries.get_mut(key) {
                    entry.expires_at = Some(expires_at);
                }
                true
            } else {
                false
            };
            (updated, expired)
        };

        self.emit_expired(expired);
        if updated && expires_at > now {
            self.schedule(Some(expires_at));
        }
        Ok(updated)
    }

    async fn increment(
        &self,
        key: &str,
        amount: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        validate_key(key)?;
        let inner = &self.inner;
        let now = inner.clock.now();
        let expires_at = inner.expires_from_ttl(now, ttl);

        let (result, expired) = {
            let mut state = inner.state.lock().unwrap();
            let expired = inner.reap_if_expired(&mut state, key, now);
            let result = match state.entries.get_mut(key) {
                Some(entry) => match entry.value.as_integer() {
                    Some(current) => {
                        let updated = current + amount;
                        entry.value = CacheValue::Integer(updated);
                        entry.last_access = now;
                        if expires_at.is_some() {
                            entry.expires_at = expires_at;
                        }
                        Ok(updated)
                    }
                    None => Err(CacheError::NotNumeric {
                        key: key.to_string(),
                    }),
                },
                None => {
                    inner.insert_entry(
                        &mut state,
                        key,
                        CacheValue::Integer(amount),
                        expires_at,
                        now,
                    );
                    Ok(amount)
                }
            };
            (result, expired)
        };

        self.emit_expired(expired.into_iter().collect());
        if result.is_ok() {
            self.schedule(expires_at);
        }
        result
    }

    async fn set_if_higher(
        &self,
        key: &str,
        value: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        conditional_set(self, key, value, ttl, |current, candidate| {
            candidate > current
        })
        .await
    }

    async fn set_if_lower(
        &self,
        key: &str,
        value: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError> {
        conditional_set(self, key, value, ttl, |current, candidate| {
            candidate < current
        })
        .await
    }
}

/// Shared body of `set_if_higher` / `set_if_lower`: stores `value` when
/// `should_store(current, value)` holds and returns the absolute
/// difference, 0 when nothing changed.
async fn conditional_set(
    client: &InMemoryCacheClient,
    key: &str,
    value: i64,
    ttl: Option<Duration>,
    should_store: impl Fn(i64, i64) -> bool,
) -> Result<i64, CacheError> {
    validate_key(key)?;
    let inner = &client.inner;
    let now = inner.clock.now();
    let expires_at = inner.expires_from_ttl(now, ttl);

    let (result, stored, expired) = {
        let mut state = inner.state.lock().unwrap();
        let expired = inner.reap_if_expired(&mut state, key, now);
        match state.entries.get_mut(key) {
            Some(entry) => match entry.value.as_integer() {
                Some(current) if should_store(current, value) => {
                    entry.value = CacheValue::Integer(value);
                    entry.last_access = now;
                    if expires_at.is_some() {
                        entry.expires_at = expires_at;
                    }
                    (Ok((value - current).abs()), true, expired)
                }
                Some(_) => (Ok(0), false, expired),
                None => (
                    Err(CacheError::NotNumeric {
                        key: key.to_string(),
                    }),
                    false,
                    expired,
                ),
            },
            None => {
                inner.insert_entry(&mut state, key, CacheValue::Integer(value), expires_at, now);
                (Ok(value.abs()), true, expired)
            }
        }
    };

    client.emit_expired(expired.into_iter().collect());
    if stored {
        client.schedule(expires_at);
    }
    result
}
