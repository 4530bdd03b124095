//! Queue-processor jobs.

use crate::job::{Job, JobResult};
use async_trait::async_trait;
use foundatio_queue::{Queue, QueueEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long each iteration polls the queue before reporting an empty run.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Processes one dequeued entry. An `Err` abandons the entry.
#[async_trait]
pub trait QueueItemProcessor<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    async fn process(
        &self,
        entry: &QueueEntry<T>,
        token: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Wraps a plain async closure as a [`QueueItemProcessor`]. The closure
/// receives its own copy of the entry.
pub fn queue_processor<T, F, Fut>(f: F) -> Arc<dyn QueueItemProcessor<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(QueueEntry<T>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>
        + Send
        + 'static,
{
    struct FnProcessor<F, T> {
        f: F,
        _payload: std::marker::PhantomData<fn(T)>,
    }

    #[async_trait]
    impl<T, F, Fut> QueueItemProcessor<T> for FnProcessor<F, T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(QueueEntry<T>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync>>>
            + Send
            + 'static,
    {
        async fn process(
            &self,
            entry: &QueueEntry<T>,
            token: CancellationToken,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            (self.f)(entry.clone(), token).await
        }
    }

    Arc::new(FnProcessor {
        f,
        _payload: std::marker::PhantomData,
    })
}

/// A job whose iterations drain one entry at a time from a queue.
///
/// An empty poll is a successful iteration; pair with a continuous run to
/// get a long-lived consumer. With `auto_complete` (the default) a
/// successful `process` completes the entry and a failing one abandons it;
/// a processor that already finalized the entry is left alone.
pub struct QueueJob<T>
where
    T: Clone + Send + Sync + 'static,
{
    queue: Arc<dyn Queue<T>>,
    processor: Arc<dyn QueueItemProcessor<T>>,
    auto_complete: bool,
    poll_timeout: Duration,
}

impl<T> QueueJob<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(queue: Arc<dyn Queue<T>>, processor: Arc<dyn QueueItemProcessor<T>>) -> Self {
        Self {
            queue,
            processor,
            auto_complete: true,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Leaves completing/abandoning to the processor.
    pub fn manual_completion(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    pub fn poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }
}

#[async_trait]
impl<T> Job for QueueJob<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run(&self, token: CancellationToken) -> JobResult {
        let entry = match self
            .queue
            .dequeue(Some(self.poll_timeout), token.clone())
            .await
        {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return if token.is_cancelled() {
                    JobResult::Cancelled
                } else {
                    JobResult::Success
                };
            }
            Err(err) => return JobResult::Failed(format!("failed to dequeue: {err}")),
        };

        if token.is_cancelled() {
            let _ = self.queue.abandon(entry.id()).await;
            return JobResult::Cancelled;
        }

        match self.processor.process(&entry, token).await {
            Ok(()) => {
                if self.auto_complete {
                    let _ = self.queue.complete(entry.id()).await;
                }
                JobResult::Success
            }
            Err(err) => {
                let message = format!("failed to process queue entry {}: {err}", entry.id());
                if self.auto_complete {
                    let _ = self.queue.abandon(entry.id()).await;
                }
                JobResult::Failed(message)
            }
        }
    }
}
