//! Pluggable building blocks for distributed applications.
//!
//! `foundatio` bundles a family of in-process abstractions an application
//! writes against once, with a pure in-memory implementation for local
//! development and interchangeable backends for production. Each block is
//! available as an individual crate and as a feature of this meta-crate.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! foundatio = { version = "0.1", features = ["queue", "jobs"] }
//! ```
//!
//! # Building Blocks
//!
//! - **Cache** (`cache`): keyed store with TTL, atomic counters,
//!   conditional writes and expiration events.
//! - **Messaging** (`messaging`): type-routed publish/subscribe with
//!   delayed publication and per-subscription sequential delivery.
//! - **Lock** (`lock`): cache+bus named mutex with fencing tokens, plus
//!   fixed-window throttling admission.
//! - **Queue** (`queue`): FIFO work queue with visibility timeouts,
//!   bounded retries, deadletter and a worker pump.
//! - **Jobs** (`jobs`): continuous and cron-scheduled job host with
//!   parallel instances, lock-gated and queue-processor jobs, and
//!   graceful drain-and-stop shutdown.
//! - **Resilience** (`resilience`): bounded-retry executor with backoff,
//!   jitter, error classification and cancellation.
//!
//! The in-memory implementations coordinate through the same contracts a
//! remote backend would implement (`CacheClient`, `MessageBus`, `Queue`,
//! `LockProvider`), so swapping a backend never touches application code.
//!
//! # Example
//!
//! ```
//! # #[cfg(all(feature = "queue", feature = "cache"))]
//! # async fn example() {
//! use foundatio::cache::{CacheClientExt, InMemoryCacheClient};
//! use foundatio::queue::{InMemoryQueue, Queue};
//!
//! let cache = InMemoryCacheClient::new();
//! cache.set("config", &"value", None).await.unwrap();
//!
//! let queue: InMemoryQueue<String> = InMemoryQueue::new();
//! queue.enqueue("work".to_string()).await.unwrap();
//! # }
//! ```

pub use foundatio_core as core;

#[cfg(feature = "cache")]
pub use foundatio_cache as cache;

#[cfg(feature = "jobs")]
pub use foundatio_jobs as jobs;

#[cfg(feature = "lock")]
pub use foundatio_lock as lock;

#[cfg(feature = "messaging")]
pub use foundatio_messaging as messaging;

#[cfg(feature = "queue")]
pub use foundatio_queue as queue;

#[cfg(feature = "resilience")]
pub use foundatio_resilience as resilience;
