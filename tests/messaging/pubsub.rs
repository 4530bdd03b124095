//! Type routing and subscription lifecycle.

use foundatio_messaging::{InMemoryMessageBus, MessageBus, MessageBusExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Foo {
    data: String,
}

#[derive(Debug, Clone)]
struct Bar {
    #[allow(dead_code)]
    data: String,
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(80)).await;
}

#[tokio::test]
async fn routing_by_type_with_subscription_cancellation() {
    let bus = InMemoryMessageBus::new();

    let foo_seen_a = Arc::new(Mutex::new(Vec::new()));
    let foo_seen_b = Arc::new(Mutex::new(Vec::new()));
    let bar_count = Arc::new(AtomicUsize::new(0));
    let cancel_a = CancellationToken::new();

    let seen = Arc::clone(&foo_seen_a);
    bus.subscribe::<Foo, _, _>(
        move |message, _| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(message.data);
            }
        },
        cancel_a.clone(),
    )
    .await
    .unwrap();

    let seen = Arc::clone(&foo_seen_b);
    bus.subscribe::<Foo, _, _>(
        move |message, _| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(message.data);
            }
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let count = Arc::clone(&bar_count);
    bus.subscribe::<Bar, _, _>(
        move |_, _| {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    bus.publish(Foo {
        data: "hi".to_string(),
    })
    .await
    .unwrap();
    settle().await;

    assert_eq!(*foo_seen_a.lock().unwrap(), vec!["hi"]);
    assert_eq!(*foo_seen_b.lock().unwrap(), vec!["hi"]);
    assert_eq!(bar_count.load(Ordering::SeqCst), 0, "Bar never sees a Foo");

    // Cancel one Foo subscription; only the other keeps receiving.
    cancel_a.cancel();
    bus.publish(Foo {
        data: "again".to_string(),
    })
    .await
    .unwrap();
    settle().await;

    assert_eq!(*foo_seen_a.lock().unwrap(), vec!["hi"]);
    assert_eq!(*foo_seen_b.lock().unwrap(), vec!["hi", "again"]);
}

#[tokio::test]
async fn double_subscribe_means_double_delivery() {
    let bus = InMemoryMessageBus::new();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let count = Arc::clone(&count);
        bus.subscribe::<Foo, _, _>(
            move |_, _| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
    }

    bus.publish(Foo {
        data: "x".to_string(),
    })
    .await
    .unwrap();
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_subscriber_does_not_block_the_fast_one() {
    let bus = InMemoryMessageBus::new();
    let fast = Arc::new(AtomicUsize::new(0));

    bus.subscribe::<Foo, _, _>(
        |_, _| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let count = Arc::clone(&fast);
    bus.subscribe::<Foo, _, _>(
        move |_, _| {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    for _ in 0..3 {
        bus.publish(Foo {
            data: "tick".to_string(),
        })
        .await
        .unwrap();
    }
    settle().await;

    assert_eq!(fast.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unsubscribe_by_id_stops_delivery() {
    let bus = InMemoryMessageBus::new();
    let count = Arc::new(AtomicUsize::new(0));

    let c = Arc::clone(&count);
    let id = bus
        .subscribe::<Foo, _, _>(
            move |_, _| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    bus.publish(Foo {
        data: "one".to_string(),
    })
    .await
    .unwrap();
    settle().await;

    assert!(bus.unsubscribe(id).await.unwrap());
    bus.publish(Foo {
        data: "two".to_string(),
    })
    .await
    .unwrap();
    settle().await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
}
