//! Fixed-window admission bounds.

use foundatio_cache::InMemoryCacheClient;
use foundatio_lock::{LockProvider, ThrottlingLockProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn provider(max_hits: i64, period: Duration) -> Arc<ThrottlingLockProvider> {
    Arc::new(
        ThrottlingLockProvider::builder(Arc::new(InMemoryCacheClient::new()))
            .max_hits(max_hits)
            .period(period)
            .build(),
    )
}

/// Windows are aligned to absolute wall time, so start each test just past
/// a boundary to keep its acquisitions inside one window.
async fn align_to_window(period: Duration) {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap();
    let into_window = Duration::from_millis((since_epoch.as_millis() % period.as_millis()) as u64);
    tokio::time::sleep(period - into_window + Duration::from_millis(20)).await;
}

#[tokio::test]
async fn six_acquisitions_against_a_window_of_three() {
    let period = Duration::from_millis(500);
    let provider = provider(3, period);
    align_to_window(period).await;

    // Three immediate admissions.
    let started = Instant::now();
    for _ in 0..3 {
        let lock = provider
            .acquire("k", None, Some(Duration::from_millis(50)), CancellationToken::new())
            .await
            .unwrap();
        assert!(lock.is_some());
    }
    assert!(started.elapsed() < Duration::from_millis(200));

    // The next three must wait for a later window.
    let mut waiters = Vec::new();
    for _ in 0..3 {
        let provider = Arc::clone(&provider);
        waiters.push(tokio::spawn(async move {
            let started = Instant::now();
            let lock = provider
                .acquire("k", None, Some(Duration::from_secs(5)), CancellationToken::new())
                .await
                .unwrap();
            (lock.is_some(), started.elapsed())
        }));
    }

    for waiter in waiters {
        let (admitted, waited) = waiter.await.unwrap();
        assert!(admitted, "overflow acquisitions succeed in a later window");
        assert!(
            waited >= Duration::from_millis(100),
            "overflow admission should not happen inside the exhausted window, waited {waited:?}"
        );
    }
}

#[tokio::test]
async fn window_count_never_exceeds_max_hits() {
    let period = Duration::from_secs(60);
    let provider = provider(5, period);

    let mut admitted = 0;
    for _ in 0..20 {
        if provider
            .acquire("bound", None, Some(Duration::from_millis(10)), CancellationToken::new())
            .await
            .unwrap()
            .is_some()
        {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 5);
}

#[tokio::test]
async fn rejected_acquisitions_do_not_consume_capacity() {
    let period = Duration::from_millis(400);
    let provider = provider(2, period);
    align_to_window(period).await;

    for _ in 0..2 {
        assert!(provider
            .acquire("k", None, Some(Duration::from_millis(10)), CancellationToken::new())
            .await
            .unwrap()
            .is_some());
    }

    // A burst of failed attempts must not poison the next window.
    for _ in 0..5 {
        assert!(provider
            .acquire("k", None, Some(Duration::from_millis(10)), CancellationToken::new())
            .await
            .unwrap()
            .is_none());
    }

    tokio::time::sleep(Duration::from_millis(450)).await;

    let mut admitted = 0;
    for _ in 0..2 {
        if provider
            .acquire("k", None, Some(Duration::from_millis(10)), CancellationToken::new())
            .await
            .unwrap()
            .is_some()
        {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 2, "full capacity is available in the new window");
}
