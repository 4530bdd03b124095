//! The job contract and the continuous run loop.

use async_trait::async_trait;
use foundatio_core::clock::Clock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of one job iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Success,
    SuccessWithMessage(String),
    Failed(String),
    Cancelled,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            JobResult::Success | JobResult::SuccessWithMessage(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobResult::Cancelled)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            JobResult::SuccessWithMessage(message) | JobResult::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// A unit of background work.
///
/// Implementations observe the cancellation token at their own suspension
/// points and return [`JobResult::Cancelled`] when they stop early because
/// of it.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, token: CancellationToken) -> JobResult;
}

/// Runs `job` repeatedly until cancellation or `iteration_limit`
/// non-cancelled iterations, pacing iterations by `interval`.
///
/// Failed iterations are logged and do not stop the loop. Returns the
/// number of completed (non-cancelled) iterations.
pub async fn run_continuous<J>(
    job: &J,
    clock: &dyn Clock,
    interval: Option<Duration>,
    iteration_limit: Option<u64>,
    token: CancellationToken,
) -> u64
where
    J: Job + ?Sized,
{
    let mut iterations = 0u64;
    if iteration_limit == Some(0) {
        return iterations;
    }

    loop {
        if token.is_cancelled() {
            break;
        }

        let result = job.run(token.clone()).await;
        match &result {
            JobResult::Cancelled => break,
            JobResult::Failed(_message) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(message = %_message, "job iteration failed");
            }
            _ => {}
        }
        iterations += 1;

        if iteration_limit.is_some_and(|limit| iterations >= limit) {
            break;
        }

        if let Some(interval) = interval.filter(|i| *i > Duration::ZERO) {
            tokio::select! {
                _ = clock.sleep(interval) => {}
                _ = token.cancelled() => break,
            }
        }
    }

    iterations
}
