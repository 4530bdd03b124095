//! Deferred publication timing.

use foundatio_messaging::{InMemoryMessageBus, MessageBusExt};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
struct Tick {
    label: String,
}

#[tokio::test]
async fn delayed_message_is_not_observed_early() {
    let bus = InMemoryMessageBus::new();
    let received_at: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&received_at);
    bus.subscribe::<Tick, _, _>(
        move |_, _| {
            let slot = Arc::clone(&slot);
            async move {
                *slot.lock().unwrap() = Some(Instant::now());
            }
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let published_at = Instant::now();
    bus.publish_delayed(
        Tick {
            label: "later".to_string(),
        },
        Duration::from_millis(300),
    )
    .await
    .unwrap();

    // The publish call has returned; delivery happens on its own later.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(received_at.lock().unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let received = received_at
        .lock()
        .unwrap()
        .expect("delayed message must eventually arrive");
    assert!(received.duration_since(published_at) >= Duration::from_millis(300));
}

#[tokio::test]
async fn delayed_messages_fire_in_due_order() {
    let bus = InMemoryMessageBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    bus.subscribe::<Tick, _, _>(
        move |message, _| {
            let s = Arc::clone(&s);
            async move {
                s.lock().unwrap().push(message.label);
            }
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    bus.publish_delayed(
        Tick {
            label: "second".to_string(),
        },
        Duration::from_millis(250),
    )
    .await
    .unwrap();
    bus.publish_delayed(
        Tick {
            label: "first".to_string(),
        },
        Duration::from_millis(100),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn zero_delay_behaves_like_immediate_publish() {
    let bus = InMemoryMessageBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    bus.subscribe::<Tick, _, _>(
        move |message, _| {
            let s = Arc::clone(&s);
            async move {
                s.lock().unwrap().push(message.label);
            }
        },
        CancellationToken::new(),
    )
    .await
    .unwrap();

    bus.publish_delayed(
        Tick {
            label: "now".to_string(),
        },
        Duration::ZERO,
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["now"]);
}
