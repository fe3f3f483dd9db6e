use std::time::Duration;

use waypoint_services::GenerationalCache;

const HOUR: Duration = Duration::from_secs(3600);

/// The race this cache exists to prevent: an invalidation lands between
/// a query starting and its result being written. The write is rejected
/// and no later reader sees the stale value.
#[tokio::test]
async fn test_invalidation_rejects_in_flight_write() {
    let cache: GenerationalCache<[u8; 32], String> = GenerationalCache::new();
    let key = [7u8; 32];

    let query = cache.begin_query(key);

    // Invalidator runs on another task while the query is "working"
    let invalidator = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.delete_all() })
    };
    invalidator.await.unwrap();

    assert!(!query.set("stale result".into(), HOUR));
    assert!(cache.begin_query(key).get().is_none());
    cache.stop();
}

/// Without an intervening invalidation the write lands and is readable
/// until its TTL runs out.
#[tokio::test]
async fn test_fresh_write_round_trips_until_expiry() {
    let cache: GenerationalCache<[u8; 32], String> = GenerationalCache::new();
    let key = [1u8; 32];

    let query = cache.begin_query(key);
    assert!(query.set("fresh".into(), Duration::from_millis(40)));
    assert_eq!(cache.begin_query(key).get(), Some("fresh".into()));

    tokio::time::sleep(Duration::from_millis(90)).await;
    assert!(cache.begin_query(key).get().is_none());
    cache.stop();
}

/// Generation comparisons are per-cache: invalidating one cache never
/// rejects writes in another.
#[tokio::test]
async fn test_generations_are_per_instance() {
    let blocks: GenerationalCache<u32, &'static str> = GenerationalCache::new();
    let headers: GenerationalCache<u32, &'static str> = GenerationalCache::new();

    let block_query = blocks.begin_query(1);
    headers.delete_all();

    assert!(block_query.set("still fresh", HOUR));
    blocks.stop();
    headers.stop();
}

/// Stop is idempotent and doesn't disable reads or writes.
#[tokio::test]
async fn test_stop_any_number_of_times() {
    let cache: GenerationalCache<u32, String> = GenerationalCache::new();
    cache.begin_query(1).set("kept".into(), HOUR);

    for _ in 0..5 {
        cache.stop();
    }

    assert_eq!(cache.begin_query(1).get(), Some("kept".into()));
}

/// Many tasks querying and invalidating concurrently: every accepted
/// write happened in the current generation, and nothing panics.
#[tokio::test]
async fn test_concurrent_queries_with_invalidations() {
    let cache: GenerationalCache<u32, usize> = GenerationalCache::new();

    let mut tasks = Vec::new();
    for i in 0..64usize {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            let query = cache.begin_query((i % 4) as u32);
            tokio::task::yield_now().await;
            if i % 8 == 0 {
                cache.delete_all();
            }
            query.set(i, HOUR)
        }));
    }

    for task in tasks {
        // Accepted or rejected depends on scheduling; panics never happen
        let _ = task.await.unwrap();
    }

    // Once the dust settles, a fresh query always commits
    let query = cache.begin_query(0);
    assert!(query.set(999, HOUR));
    assert_eq!(cache.begin_query(0).get(), Some(999));
    cache.stop();
}
