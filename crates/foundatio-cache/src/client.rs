//! The cache contract.
//!
//! [`CacheClient`] is object-safe and operates on [`CacheValue`]; remote
//! backends implement exactly this surface. [`CacheClientExt`] layers the
//! typed `get`/`set`/`add`/`replace` sugar on top via a serde round-trip,
//! so callers keep working against `Arc<dyn CacheClient>`.

use crate::error::CacheError;
use crate::value::CacheValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Keyed store with TTL, conditional writes and atomic counters.
///
/// All operations report success/failure through their return value;
/// missing keys are never errors. `Err` is reserved for serialization and
/// configuration faults.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Unconditionally stores `value` under `key`.
    async fn set_value(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Stores `value` only if `key` is absent (or expired). Returns whether
    /// the value was stored.
    async fn add_value(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Stores `value` only if `key` is present and unexpired.
    async fn replace_value(
        &self,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Compare-and-set: stores `value` (and resets the TTL) only if the
    /// current value equals `expected`.
    async fn replace_if_equal(
        &self,
        key: &str,
        expected: &CacheValue,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>;

    /// Reads the value under `key`, if present and unexpired.
    async fn get_value(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    /// Reads several keys at once; misses are simply absent from the map.
    async fn get_values(&self, keys: &[&str]) -> Result<HashMap<String, CacheValue>, CacheError>;

    /// Stores several values with a shared TTL.
    async fn set_values(
        &self,
        values: Vec<(String, CacheValue)>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Removes `key`. Returns whether a live entry was removed.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Compare-and-delete: removes `key` only if the current value equals
    /// `expected`.
    async fn remove_if_equal(&self, key: &str, expected: &CacheValue) -> Result<bool, CacheError>;

    /// Removes every key with the given literal prefix. Returns the number
    /// of live entries removed; expired entries encountered during the scan
    /// are removed as expirations.
    async fn remove_by_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Removes everything. Returns the number of entries removed.
    async fn clear(&self) -> Result<usize, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Number of live entries.
    async fn count(&self) -> Result<usize, CacheError>;

    /// Absolute expiry of `key`, if the entry exists and has one.
    async fn get_expiration(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError>;

    /// Re-points the expiry of an existing entry. Returns false when the
    /// key is absent.
    async fn set_expiration(&self, key: &str, expires_at: DateTime<Utc>)
        -> Result<bool, CacheError>;

    /// Atomically adds `amount` (which may be negative) to the counter at
    /// `key`, creating it when absent. Returns the new value.
    async fn increment(
        &self,
        key: &str,
        amount: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError>;

    /// Stores `value` iff it is greater than the current value (or the key
    /// is absent). Returns the absolute difference, 0 when unchanged.
    async fn set_if_higher(
        &self,
        key: &str,
        value: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError>;

    /// Stores `value` iff it is less than the current value (or the key is
    /// absent). Returns the absolute difference, 0 when unchanged.
    async fn set_if_lower(
        &self,
        key: &str,
        value: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, CacheError>;
}

/// Typed convenience methods over any [`CacheClient`].
#[async_trait]
pub trait CacheClientExt: CacheClient {
    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.set_value(key, CacheValue::from_serialize(value)?, ttl)
            .await
    }

    async fn add<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<bool, CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.add_value(key, CacheValue::from_serialize(value)?, ttl)
            .await
    }

    async fn replace<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.replace_value(key, CacheValue::from_serialize(value)?, ttl)
            .await
    }

    /// Typed read. `Ok(None)` is a miss; a present value that cannot
    /// deserialize into `T` is a serialization error.
    async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        match self.get_value(key).await? {
            Some(value) => Ok(Some(value.into_deserialize()?)),
            None => Ok(None),
        }
    }
}

impl<C: CacheClient + ?Sized> CacheClientExt for C {}
