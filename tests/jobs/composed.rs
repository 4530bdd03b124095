//! Lock-gated and queue-processor jobs running under the host.

use async_trait::async_trait;
use foundatio_cache::InMemoryCacheClient;
use foundatio_jobs::{
    queue_processor, Job, JobOptions, JobResult, JobRunner, LockedJob, QueueJob,
};
use foundatio_lock::{CacheLockProvider, Lock, LockProvider};
use foundatio_messaging::InMemoryMessageBus;
use foundatio_queue::{InMemoryQueue, Queue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn lock_provider() -> Arc<dyn LockProvider> {
    Arc::new(CacheLockProvider::new(
        Arc::new(InMemoryCacheClient::new()),
        Arc::new(InMemoryMessageBus::new()),
    ))
}

struct WorkJob {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl Job for WorkJob {
    async fn run(&self, _token: CancellationToken) -> JobResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        JobResult::Success
    }
}

#[tokio::test]
async fn queue_job_drains_the_queue_under_the_runner() {
    let queue: Arc<InMemoryQueue<u32>> = Arc::new(
        InMemoryQueue::<u32>::builder()
            .retries(0)
            .retry_delay(Duration::ZERO)
            .build(),
    );
    for value in 0..5u32 {
        queue.enqueue(value).await.unwrap();
    }

    let processed = Arc::new(AtomicUsize::new(0));
    let p = Arc::clone(&processed);
    let job = QueueJob::new(
        queue.clone() as _,
        queue_processor(move |_entry: foundatio_queue::QueueEntry<u32>, _token| {
            let p = Arc::clone(&p);
            async move {
                p.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
    .poll_timeout(Duration::from_millis(50));

    let runner = JobRunner::new();
    runner
        .register(Arc::new(job), JobOptions::new("drain").iteration_limit(5))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    tokio::time::timeout(Duration::from_secs(5), runner.shutdown())
        .await
        .expect("runner should drain");

    assert_eq!(processed.load(Ordering::SeqCst), 5);
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.queued, 0);
}

#[tokio::test]
async fn contested_locked_job_burns_iterations_without_working() {
    let provider = lock_provider();
    let held = provider
        .acquire("report", None, None, CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let job = LockedJob::new(
        WorkJob {
            runs: Arc::clone(&runs),
        },
        Arc::clone(&provider),
        "report",
    );

    let runner = JobRunner::new();
    runner
        .register(Arc::new(job), JobOptions::new("report").iteration_limit(3))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    runner.shutdown().await;

    // Every iteration was a "lock not acquired" success; the limit is
    // spent without any work happening.
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    held.release().await.unwrap();
}

#[tokio::test]
async fn two_locked_instances_do_not_overlap() {
    let provider = lock_provider();
    let concurrent = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    struct ExclusiveJob {
        concurrent: Arc<AtomicUsize>,
        overlaps: Arc<AtomicUsize>,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Job for ExclusiveJob {
        async fn run(&self, _token: CancellationToken) -> JobResult {
            if self.concurrent.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            JobResult::Success
        }
    }

    let job = LockedJob::new(
        ExclusiveJob {
            concurrent: Arc::clone(&concurrent),
            overlaps: Arc::clone(&overlaps),
            runs: Arc::clone(&runs),
        },
        Arc::clone(&provider),
        "exclusive",
    );

    let runner = JobRunner::new();
    runner
        .register(
            Arc::new(job),
            JobOptions::new("exclusive")
                .instance_count(2)
                .iteration_limit(10)
                .interval(Duration::from_millis(5)),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    runner.shutdown().await;

    assert_eq!(overlaps.load(Ordering::SeqCst), 0, "lock must serialize runs");
    assert!(runs.load(Ordering::SeqCst) > 0);
}
