//! In-memory caching building block for foundatio.
//!
//! Provides a keyed store with per-entry TTL, atomic counters, conditional
//! writes (`add`, `replace_if_equal`, `remove_if_equal`), literal prefix
//! deletion, an optional entry cap with LRU-style eviction, and expiration
//! events. The object-safe [`CacheClient`] trait is the seam remote
//! backends (Redis, etc.) implement; [`InMemoryCacheClient`] is the
//! reference implementation used for local development and by the lock and
//! throttling providers.
//!
//! # Examples
//!
//! ```
//! use foundatio_cache::{CacheClient, CacheClientExt, InMemoryCacheClient};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), foundatio_cache::CacheError> {
//! let cache = InMemoryCacheClient::new();
//!
//! cache.set("user:42", &"alice", Some(Duration::from_secs(300))).await?;
//! assert_eq!(cache.get::<String>("user:42").await?.as_deref(), Some("alice"));
//!
//! // Counters are atomic read-modify-write operations.
//! let hits = cache.increment("hits", 1, None).await?;
//! assert_eq!(hits, 1);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod events;
mod memory;
mod value;

pub use client::{CacheClient, CacheClientExt};
pub use config::InMemoryCacheClientBuilder;
pub use error::CacheError;
pub use events::ItemExpiredEvent;
pub use memory::InMemoryCacheClient;
pub use value::CacheValue;
