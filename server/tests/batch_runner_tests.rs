//! Properties of the bounded concurrency runner.

use anyhow::anyhow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use server::batch::map_limit;

#[tokio::test]
async fn preserves_input_order_regardless_of_completion_order() {
    let items: Vec<u64> = (0..8).collect();
    let results = map_limit(items, 4, |i| async move {
        // Later items finish first.
        tokio::time::sleep(Duration::from_millis((8 - i) * 5)).await;
        Ok(i * 2)
    })
    .await;

    let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, vec![0, 2, 4, 6, 8, 10, 12, 14]);
}

#[tokio::test]
async fn individual_failures_do_not_abort_the_batch() {
    let items: Vec<u64> = (0..6).collect();
    let results = map_limit(items, 2, |i| async move {
        if i % 2 == 0 {
            Err(anyhow!("item {} failed", i))
        } else {
            Ok(i)
        }
    })
    .await;

    assert_eq!(results.len(), 6);
    for (i, outcome) in results.iter().enumerate() {
        if i % 2 == 0 {
            assert!(outcome.is_err());
        } else {
            assert_eq!(*outcome.as_ref().unwrap(), i as u64);
        }
    }
}

#[tokio::test]
async fn never_exceeds_the_in_flight_limit() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let items: Vec<u64> = (0..20).collect();
    let results = map_limit(items, 3, |_| {
        let in_flight = in_flight.clone();
        let max_seen = max_seen.clone();
        async move {
            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
    .await;

    assert_eq!(results.len(), 20);
    assert!(max_seen.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn limit_is_clamped_to_valid_range() {
    // Zero clamps to one.
    let results = map_limit(vec![1, 2, 3], 0, |i| async move { Ok(i) }).await;
    assert_eq!(results.len(), 3);

    // A limit beyond the item count clamps down.
    let results = map_limit(vec![1, 2], 100, |i| async move { Ok(i) }).await;
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn empty_input_never_invokes_the_mapper() {
    let calls = Arc::new(AtomicUsize::new(0));
    let results = map_limit(Vec::<u64>::new(), 4, |i| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(i)
        }
    })
    .await;

    assert!(results.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
