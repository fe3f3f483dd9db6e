//! Generational TTL cache.
//!
//! A keyed cache for query paths that do external work between the miss
//! and the write. That window races with invalidation:
//!
//! 1. a query misses and goes off to compute its result
//! 2. the cache is invalidated (a block lands, `delete_all` runs)
//! 3. the query finishes and writes its now-stale result
//!
//! Each `begin_query` captures the cache's generation; `delete_all`
//! clears the map and bumps the generation; a write only commits when its
//! captured generation still matches. Invalidation stays a constant-time
//! global action, and the staleness check happens at the one place it can
//! be decided — the write site.
//!
//! The generation is an atomic, deliberately not guarded by the map: the
//! ordering must be established without blocking readers.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Notify;

/// How often the background sweeper evicts expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

struct Shared<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    generation: AtomicU64,
    stopped: AtomicBool,
    stop_signal: Notify,
}

/// Keyed TTL cache with generation-guarded writes.
///
/// Must be created inside a tokio runtime; the expiry sweeper runs as a
/// background task until [`stop`](GenerationalCache::stop) is called.
pub struct GenerationalCache<K, V> {
    inner: Arc<Shared<K, V>>,
}

impl<K, V> Clone for GenerationalCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> GenerationalCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache and start its expiry sweeper.
    pub fn new() -> Self {
        Self::with_sweep_interval(SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        let inner = Arc::new(Shared {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            stop_signal: Notify::new(),
        });

        let shared = inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        shared.entries.retain(|_, entry| entry.expires_at > now);
                    }
                    _ = shared.stop_signal.notified() => break,
                }
            }
        });

        Self { inner }
    }

    /// Start a generation-safe query for `key`, capturing the current
    /// generation. Use this for get→work→set patterns.
    pub fn begin_query(&self, key: K) -> CacheQuery<K, V> {
        CacheQuery {
            cache: self.inner.clone(),
            key,
            generation: self.inner.generation.load(Ordering::Acquire),
        }
    }

    /// Drop every entry and advance the generation. Any in-flight query
    /// that began before this call will have its write rejected.
    pub fn delete_all(&self) {
        self.inner.entries.clear();
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Halt the background sweeper. Safe to call any number of times;
    /// reads and writes keep working afterwards, expired entries just
    /// stop being evicted eagerly.
    pub fn stop(&self) {
        if self
            .inner
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.inner.stop_signal.notify_one();
        }
    }
}

/// One scoped cache operation. Created by
/// [`begin_query`](GenerationalCache::begin_query); holds the generation
/// observed at that point.
pub struct CacheQuery<K, V> {
    cache: Arc<Shared<K, V>>,
    key: K,
    generation: u64,
}

impl<K, V> CacheQuery<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// TTL lookup. Expired entries are misses — the sweeper removes them
    /// lazily, the read path just ignores them. Hits do not extend the
    /// TTL.
    pub fn get(&self) -> Option<V> {
        let entry = self.cache.entries.get(&self.key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Commit a value, unless the cache was invalidated after this query
    /// began. Returns whether the write was accepted.
    pub fn set(&self, value: V, ttl: Duration) -> bool {
        if self.generation != self.cache.generation.load(Ordering::Acquire) {
            return false;
        }
        self.cache.entries.insert(
            self.key.clone(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }
}
