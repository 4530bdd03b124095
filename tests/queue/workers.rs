//! Worker pump behavior and delivery accounting.

use foundatio_queue::{work_item_handler, InMemoryQueue, Queue, QueueEntry};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn every_enqueued_item_is_observed_or_deadlettered() {
    let queue: InMemoryQueue<u32> = InMemoryQueue::<u32>::builder()
        .retries(0)
        .retry_delay(Duration::ZERO)
        .build();
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let token = CancellationToken::new();

    let s = Arc::clone(&seen);
    queue
        .start_working(
            work_item_handler(move |entry: QueueEntry<u32>, _| {
                let s = Arc::clone(&s);
                async move {
                    let value = *entry.value();
                    s.lock().unwrap().insert(value);
                    // Every third item fails and goes to the deadletter.
                    if value % 3 == 0 {
                        Err("unprocessable".into())
                    } else {
                        Ok(())
                    }
                }
            }),
            true,
            3,
            token.clone(),
        )
        .await
        .unwrap();

    for value in 0..30u32 {
        queue.enqueue(value).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    token.cancel();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 30, "every item was handed to a worker");

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.abandoned, 10);
    assert_eq!(stats.deadletter, 10);
    // Delivery accounting: everything dequeued is accounted for.
    assert_eq!(
        stats.dequeued,
        stats.completed + stats.abandoned + stats.working
    );
}

#[tokio::test]
async fn handler_panics_abandon_instead_of_killing_workers() {
    let queue: InMemoryQueue<String> = InMemoryQueue::<String>::builder()
        .retries(0)
        .retry_delay(Duration::ZERO)
        .build();
    let processed = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();

    let p = Arc::clone(&processed);
    queue
        .start_working(
            work_item_handler(move |entry: QueueEntry<String>, _| {
                let p = Arc::clone(&p);
                async move {
                    if entry.value() == "boom" {
                        panic!("handler blew up");
                    }
                    p.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
            true,
            1,
            token.clone(),
        )
        .await
        .unwrap();

    queue.enqueue("boom".to_string()).await.unwrap();
    queue.enqueue("fine".to_string()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    token.cancel();

    assert_eq!(processed.load(Ordering::SeqCst), 1);
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.deadletter, 1);
}

#[tokio::test]
async fn cancelled_pump_stops_taking_work() {
    let queue: InMemoryQueue<u32> = InMemoryQueue::<u32>::builder().retries(0).build();
    let processed = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();

    let p = Arc::clone(&processed);
    queue
        .start_working(
            work_item_handler(move |_entry: QueueEntry<u32>, _| {
                let p = Arc::clone(&p);
                async move {
                    p.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
            true,
            2,
            token.clone(),
        )
        .await
        .unwrap();

    queue.enqueue(1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    queue.enqueue(2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(processed.load(Ordering::SeqCst), 1);
    assert_eq!(queue.stats().await.unwrap().queued, 1);
}
