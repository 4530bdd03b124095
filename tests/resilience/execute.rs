//! Retries around real operations and cancellation bounds.

use foundatio_cache::{CacheClientExt, InMemoryCacheClient};
use foundatio_resilience::{PolicyError, ResiliencePolicy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
struct NotReady;

impl std::fmt::Display for NotReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value not ready")
    }
}

#[tokio::test]
async fn policy_retries_until_a_dependency_catches_up() {
    let cache = Arc::new(InMemoryCacheClient::new());
    let policy = ResiliencePolicy::<NotReady>::builder()
        .max_attempts(10)
        .fixed_backoff(Duration::from_millis(25))
        .build();

    // A writer lands the value after a few retries' worth of time.
    {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            cache.set("flag", &42i64, None).await.unwrap();
        });
    }

    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);
    let value = policy
        .execute(
            move |_| {
                let cache = Arc::clone(&cache);
                let a = Arc::clone(&a);
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    cache
                        .get::<i64>("flag")
                        .await
                        .ok()
                        .flatten()
                        .ok_or(NotReady)
                }
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(value, 42);
    assert!(attempts.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn cancellation_drops_a_hung_operation() {
    let policy = ResiliencePolicy::<NotReady>::builder()
        .max_attempts(3)
        .fixed_backoff(Duration::from_millis(10))
        .build();
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result: Result<(), _> = policy
        .execute(
            |_| async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(())
            },
            token,
        )
        .await;

    assert_eq!(result.unwrap_err(), PolicyError::Canceled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn zero_retry_policy_is_single_shot() {
    let policy = ResiliencePolicy::<NotReady>::no_retries();
    let attempts = Arc::new(AtomicUsize::new(0));

    let a = Arc::clone(&attempts);
    let result: Result<(), _> = policy
        .execute(
            move |_| {
                let a = Arc::clone(&a);
                async move {
                    a.fetch_add(1, Ordering::SeqCst);
                    Err(NotReady)
                }
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(result.unwrap_err(), PolicyError::Inner(NotReady));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
