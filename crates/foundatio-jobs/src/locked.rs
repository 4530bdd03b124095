//! Lock-gated jobs.

use crate::job::{Job, JobResult};
use async_trait::async_trait;
use foundatio_lock::LockProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wraps a job so each iteration runs under a named lock.
///
/// When the lock cannot be acquired the iteration still counts and reports
/// `SuccessWithMessage("lock not acquired")`. That keeps cron- and
/// interval-driven jobs from busy-spinning on a contested lock, at the
/// price that a contested lock can consume iterations without doing work.
pub struct LockedJob<J> {
    inner: J,
    provider: Arc<dyn LockProvider>,
    resource: String,
    time_until_expires: Option<Duration>,
    acquire_timeout: Duration,
}

impl<J: Job> LockedJob<J> {
    /// Gates `inner` behind the lock named `resource`. Acquisition is a
    /// single try by default (`acquire_timeout` zero).
    pub fn new(inner: J, provider: Arc<dyn LockProvider>, resource: impl Into<String>) -> Self {
        Self {
            inner,
            provider,
            resource: resource.into(),
            time_until_expires: None,
            acquire_timeout: Duration::ZERO,
        }
    }

    /// Sets the lock TTL for each iteration.
    pub fn time_until_expires(mut self, ttl: Duration) -> Self {
        self.time_until_expires = Some(ttl);
        self
    }

    /// Waits up to `timeout` for the lock instead of a single try.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

#[async_trait]
impl<J: Job> Job for LockedJob<J> {
    async fn run(&self, token: CancellationToken) -> JobResult {
        let lock = match self
            .provider
            .acquire(
                &self.resource,
                self.time_until_expires,
                Some(self.acquire_timeout),
                token.clone(),
            )
            .await
        {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                if token.is_cancelled() {
                    return JobResult::Cancelled;
                }
                #[cfg(feature = "tracing")]
                tracing::debug!(resource = %self.resource, "job lock not acquired, skipping iteration");
                return JobResult::SuccessWithMessage("lock not acquired".to_string());
            }
            Err(err) => return JobResult::Failed(format!("failed to acquire job lock: {err}")),
        };

        let result = self.inner.run(token).await;

        if let Err(_err) = lock.release().await {
            #[cfg(feature = "tracing")]
            tracing::warn!(resource = %self.resource, error = %_err, "failed to release job lock");
        }
        result
    }
}
