//! Concurrent counter and conditional-write races.

use foundatio_cache::{CacheClient, CacheClientExt, InMemoryCacheClient, CacheValue};
use std::sync::Arc;

#[tokio::test]
async fn concurrent_increments_lose_nothing() {
    let cache = Arc::new(InMemoryCacheClient::new());

    let mut tasks = Vec::new();
    for _ in 0..50 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                cache.increment("counter", 1, None).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(cache.get::<i64>("counter").await.unwrap(), Some(1000));
}

#[tokio::test]
async fn concurrent_add_admits_exactly_one_winner() {
    let cache = Arc::new(InMemoryCacheClient::new());

    let mut tasks = Vec::new();
    for contender in 0..32u32 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            cache
                .add_value("exclusive", CacheValue::Integer(contender as i64), None)
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "add is create-if-absent, one caller wins");
}

#[tokio::test]
async fn concurrent_set_if_higher_converges_to_the_maximum() {
    let cache = Arc::new(InMemoryCacheClient::new());

    let mut tasks = Vec::new();
    for value in 1..=64i64 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            cache.set_if_higher("peak", value, None).await.unwrap()
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(cache.get::<i64>("peak").await.unwrap(), Some(64));
}

#[tokio::test]
async fn compare_writes_see_a_consistent_value() {
    let cache = Arc::new(InMemoryCacheClient::new());
    cache.set("slot", "initial", None).await.unwrap();

    // Many racing compare-and-deletes: only one observes the value.
    let mut tasks = Vec::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            cache
                .remove_if_equal("slot", &CacheValue::from("initial"))
                .await
                .unwrap()
        }));
    }

    let mut removed = 0;
    for task in tasks {
        if task.await.unwrap() {
            removed += 1;
        }
    }
    assert_eq!(removed, 1);
    assert!(!cache.exists("slot").await.unwrap());
}
