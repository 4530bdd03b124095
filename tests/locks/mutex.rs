//! Single-holder semantics of the cache-based lock provider.

use foundatio_cache::InMemoryCacheClient;
use foundatio_lock::{CacheLockProvider, Lock, LockProvider};
use foundatio_messaging::InMemoryMessageBus;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn provider() -> Arc<CacheLockProvider> {
    Arc::new(CacheLockProvider::new(
        Arc::new(InMemoryCacheClient::new()),
        Arc::new(InMemoryMessageBus::new()),
    ))
}

#[tokio::test]
async fn two_contenders_one_winner() {
    let provider = provider();

    let contend = |provider: Arc<CacheLockProvider>| {
        tokio::spawn(async move {
            let started = Instant::now();
            let lock = provider
                .acquire(
                    "r",
                    Some(Duration::from_secs(1)),
                    Some(Duration::from_millis(500)),
                    CancellationToken::new(),
                )
                .await
                .unwrap();
            (lock, started.elapsed())
        })
    };

    let (first, second) = tokio::join!(
        contend(Arc::clone(&provider)),
        contend(Arc::clone(&provider))
    );
    let (first_lock, first_elapsed) = first.unwrap();
    let (second_lock, second_elapsed) = second.unwrap();

    let winners = [&first_lock, &second_lock]
        .iter()
        .filter(|lock| lock.is_some())
        .count();
    assert_eq!(winners, 1, "exactly one contender may hold the lock");

    let (winner, loser_elapsed) = if first_lock.is_some() {
        (first_lock, second_elapsed)
    } else {
        (second_lock, first_elapsed)
    };
    assert!(
        loser_elapsed >= Duration::from_millis(450),
        "loser should wait out the acquire timeout, waited {loser_elapsed:?}"
    );

    // After the winner releases, the resource is acquirable again.
    winner.unwrap().release().await.unwrap();

    let third = provider
        .acquire("r", None, Some(Duration::from_millis(100)), CancellationToken::new())
        .await
        .unwrap();
    assert!(third.is_some());
}

#[tokio::test]
async fn fencing_tokens_are_unique_per_acquisition() {
    let provider = provider();

    let first = provider
        .acquire("r", None, None, CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    let first_id = first.lock_id().to_string();
    first.release().await.unwrap();

    let second = provider
        .acquire("r", None, None, CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(first_id, second.lock_id());
    second.release().await.unwrap();
}

#[tokio::test]
async fn expired_holder_cannot_release_the_successor() {
    let provider = provider();

    let expired = provider
        .acquire(
            "r",
            Some(Duration::from_millis(60)),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!provider.is_locked("r").await.unwrap());

    let successor = provider
        .acquire("r", Some(Duration::from_secs(5)), None, CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    // Stale release is a no-op against the successor's token.
    expired.release().await.unwrap();
    assert!(provider.is_locked("r").await.unwrap());

    successor.release().await.unwrap();
    assert!(!provider.is_locked("r").await.unwrap());
}

#[tokio::test]
async fn waiters_are_woken_by_release_not_ttl() {
    let provider = provider();

    // Long TTL: if the waiter only watched the TTL it would block for ages.
    let held = provider
        .acquire("r", Some(Duration::from_secs(60)), None, CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    let waiter = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move {
            let started = Instant::now();
            let lock = provider
                .acquire(
                    "r",
                    None,
                    Some(Duration::from_secs(30)),
                    CancellationToken::new(),
                )
                .await
                .unwrap();
            (lock, started.elapsed())
        })
    };

    tokio::time::sleep(Duration::from_millis(150)).await;
    held.release().await.unwrap();

    let (lock, waited) = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("release should wake the waiter")
        .unwrap();
    assert!(lock.is_some());
    assert!(waited < Duration::from_secs(5));
}

#[tokio::test]
async fn renewal_keeps_the_lock_alive_past_its_original_ttl() {
    let provider = provider();
    let lock = provider
        .acquire(
            "r",
            Some(Duration::from_millis(200)),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(lock.renew(Some(Duration::from_millis(400))).await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;
    // Original TTL has passed; the renewal keeps us the holder.
    assert!(provider.is_locked("r").await.unwrap());

    lock.release().await.unwrap();
}
