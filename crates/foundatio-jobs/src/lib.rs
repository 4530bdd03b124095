//! Job hosting building block for foundatio.
//!
//! A [`Job`] is one unit of background work returning a [`JobResult`].
//! [`run_continuous`] repeats it with interval pacing and an optional
//! iteration limit; the [`JobRunner`] hosts many jobs at once with
//! parallel instance counts, cron scheduling and cooperative drain-and-stop
//! shutdown. Two composable wrappers cover the common shapes:
//! [`LockedJob`] gates each iteration behind a distributed lock, and
//! [`QueueJob`] turns a work queue into a continuously-polled consumer.
//!
//! # Examples
//!
//! ```
//! use foundatio_jobs::{Job, JobOptions, JobResult, JobRunner};
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//!
//! struct HeartbeatJob;
//!
//! #[async_trait]
//! impl Job for HeartbeatJob {
//!     async fn run(&self, _token: CancellationToken) -> JobResult {
//!         JobResult::Success
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), foundatio_jobs::JobError> {
//! let runner = JobRunner::new();
//! runner.register(
//!     std::sync::Arc::new(HeartbeatJob),
//!     JobOptions::new("heartbeat")
//!         .interval(std::time::Duration::from_millis(10))
//!         .iteration_limit(3),
//! )?;
//! runner.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod job;
mod locked;
mod queue_job;
mod runner;

pub use error::JobError;
pub use job::{run_continuous, Job, JobResult};
pub use locked::LockedJob;
pub use queue_job::{queue_processor, QueueItemProcessor, QueueJob, DEFAULT_POLL_TIMEOUT};
pub use runner::{JobOptions, JobRunner};
