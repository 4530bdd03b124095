//! Lock contracts.

use crate::error::LockError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lock TTL applied when the caller does not specify one.
pub const DEFAULT_TIME_UNTIL_EXPIRES: Duration = Duration::from_secs(30);

/// Wait budget applied when the caller does not specify one.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// A held lock (or throttle admission).
///
/// Dropping a lock does not release it; call [`Lock::release`]. An
/// unreleased lock simply expires at its TTL.
#[async_trait]
pub trait Lock: Send + Sync {
    /// The resource name this lock covers.
    fn resource(&self) -> &str;

    /// Fencing token: unique per acquisition, stable for the lock's
    /// lifetime. Callers may attach it to downstream operations.
    fn lock_id(&self) -> &str;

    fn acquired_at(&self) -> DateTime<Utc>;

    /// How long the caller waited inside `acquire`.
    fn time_waited(&self) -> Duration;

    fn renewal_count(&self) -> usize;

    /// Releases the lock. Safe to call more than once, and a no-op when
    /// the lock has already expired or been taken over.
    async fn release(&self) -> Result<(), LockError>;

    /// Extends the lock's TTL (reusing the previous TTL when `None`).
    /// Returns false when the lock has been lost.
    async fn renew(&self, time_until_expires: Option<Duration>) -> Result<bool, LockError>;
}

/// Named cooperative mutex (or admission) provider.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Attempts to acquire `resource`, waiting up to `acquire_timeout`.
    /// Returns `Ok(None)` on timeout or cancellation.
    async fn acquire(
        &self,
        resource: &str,
        time_until_expires: Option<Duration>,
        acquire_timeout: Option<Duration>,
        token: CancellationToken,
    ) -> Result<Option<Box<dyn Lock>>, LockError>;

    /// Whether `resource` is currently held.
    async fn is_locked(&self, resource: &str) -> Result<bool, LockError>;
}

/// Published whenever a lock is released so waiters re-check immediately
/// instead of sleeping out the entry's TTL.
#[derive(Debug, Clone)]
pub struct LockReleased {
    pub resource: String,
}
