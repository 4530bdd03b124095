//! Distributed locks for foundatio.
//!
//! Two providers share the [`LockProvider`] contract:
//!
//! - [`CacheLockProvider`]: a named cooperative mutex. The lock lives in a
//!   cache entry holding a random fencing token; waiters are woken by a
//!   [`LockReleased`] message published on release, and fall back to the
//!   holder's TTL deadline. Release and renewal are compare-and-delete /
//!   compare-and-set on the fencing token, so stale callers can never
//!   clobber the current holder.
//! - [`ThrottlingLockProvider`]: fixed-window admission (at most
//!   `max_hits` acquisitions per `period` per resource) backed by a cache
//!   counter. Its locks are no-ops to release.
//!
//! # Examples
//!
//! ```
//! use foundatio_cache::InMemoryCacheClient;
//! use foundatio_lock::{CacheLockProvider, LockProvider};
//! use foundatio_messaging::InMemoryMessageBus;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), foundatio_lock::LockError> {
//! let provider = CacheLockProvider::new(
//!     Arc::new(InMemoryCacheClient::new()),
//!     Arc::new(InMemoryMessageBus::new()),
//! );
//!
//! if let Some(lock) = provider
//!     .acquire("nightly-report", None, None, CancellationToken::new())
//!     .await?
//! {
//!     // ... exclusive work ...
//!     lock.release().await?;
//! }
//! # Ok(())
//! # }
//! ```

mod cache_lock;
mod error;
mod lock;
mod throttling;

pub use cache_lock::CacheLockProvider;
pub use error::LockError;
pub use lock::{
    Lock, LockProvider, LockReleased, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_TIME_UNTIL_EXPIRES,
};
pub use throttling::{ThrottlingLockProvider, ThrottlingLockProviderBuilder};
