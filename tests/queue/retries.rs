//! Abandon, retry scheduling and deadletter redirection.

use foundatio_queue::{InMemoryQueue, Queue};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn retry_then_deadletter() {
    let queue: InMemoryQueue<String> = InMemoryQueue::<String>::builder()
        .retries(1)
        .retry_delay(Duration::from_millis(50))
        .retry_multipliers(vec![1])
        .work_item_timeout(Duration::from_secs(1))
        .build();

    queue.enqueue("X".to_string()).await.unwrap();

    let first = queue
        .dequeue(Some(Duration::from_secs(1)), CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.value(), "X");
    assert_eq!(first.attempts(), 1);
    queue.abandon(first.id()).await.unwrap();

    // The retry is scheduled, not immediately ready.
    assert!(queue
        .dequeue(Some(Duration::ZERO), CancellationToken::new())
        .await
        .unwrap()
        .is_none());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = queue
        .dequeue(Some(Duration::from_secs(1)), CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.value(), "X");
    assert_eq!(second.attempts(), 2);
    queue.abandon(second.id()).await.unwrap();

    // Retry budget spent: nothing comes back.
    let third = queue
        .dequeue(Some(Duration::from_millis(150)), CancellationToken::new())
        .await
        .unwrap();
    assert!(third.is_none());

    assert_eq!(queue.deadletter_items().await.unwrap(), vec!["X"]);
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.abandoned, 2);
    assert_eq!(stats.deadletter, 1);
}

#[tokio::test]
async fn abandoned_item_reappears_with_incremented_attempts() {
    let queue: InMemoryQueue<u32> = InMemoryQueue::<u32>::builder()
        .retries(3)
        .retry_delay(Duration::ZERO)
        .build();

    queue.enqueue(7).await.unwrap();

    for expected_attempt in 1..=3 {
        let entry = queue
            .dequeue(Some(Duration::from_secs(1)), CancellationToken::new())
            .await
            .unwrap()
            .expect("abandoned item must come back");
        assert_eq!(*entry.value(), 7);
        assert_eq!(entry.attempts(), expected_attempt);
        queue.abandon(entry.id()).await.unwrap();
    }

    // Still within budget (retries = 3 allows a 4th delivery).
    let entry = queue
        .dequeue(Some(Duration::from_secs(1)), CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.attempts(), 4);
    queue.complete(entry.id()).await.unwrap();

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.deadletter, 0);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn terminal_operations_are_idempotent() {
    let queue: InMemoryQueue<String> = InMemoryQueue::<String>::builder()
        .retries(2)
        .retry_delay(Duration::ZERO)
        .build();
    queue.enqueue("once".to_string()).await.unwrap();

    let entry = queue
        .dequeue(Some(Duration::from_secs(1)), CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert!(queue.complete(entry.id()).await.unwrap());
    assert!(!queue.complete(entry.id()).await.unwrap());
    assert!(!queue.abandon(entry.id()).await.unwrap());
    assert!(!queue.renew_lock(entry.id()).await.unwrap());

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.abandoned, 0);
    assert_eq!(stats.queued, 0);
}
