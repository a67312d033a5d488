//! Bounded concurrency runner for data-dependent fan-outs.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Runs `mapper` over `items` with at most `limit` futures in flight,
/// returning one outcome per item in input order. An individual
/// failure becomes an `Err` entry; it never aborts the batch. `limit`
/// is clamped to `[1, items.len()]`.
pub async fn map_limit<T, R, F, Fut>(items: Vec<T>, limit: usize, mapper: F) -> Vec<Result<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if items.is_empty() {
        return Vec::new();
    }
    let limit = limit.clamp(1, items.len());
    stream::iter(items)
        .map(mapper)
        .buffered(limit)
        .collect()
        .await
}
