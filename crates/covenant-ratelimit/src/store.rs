//! Counter stores.
//!
//! The limiter needs a single primitive from its backing store: increment a
//! counter and return the new value, setting an expiry only when the counter
//! is created. [`MemoryCounterStore`] provides it in-process;
//! [`RedisCounterStore`](crate::RedisCounterStore) provides it across
//! instances.

use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Increments between sweeps of expired counters, by default.
pub const DEFAULT_SWEEP_INTERVAL: u64 = 1024;

/// An atomic counter store with per-key expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments `key` and returns the new count.
    ///
    /// A key that does not exist (or has expired as of `now`) starts at 1 and
    /// expires `ttl` after `now`. Later increments leave the expiry alone.
    async fn increment(
        &self,
        key: &str,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-process counter store.
///
/// Counters expire lazily, checked against the `now` passed to each call.
/// Every `sweep_interval` increments the store also drops all counters
/// expired as of that call, so keys from past windows do not pile up.
#[derive(Debug)]
pub struct MemoryCounterStore {
    counters: DashMap<String, Counter>,
    increments: AtomicU64,
    sweep_interval: u64,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryCounterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that sweeps every `interval` increments.
    /// An interval of zero is treated as one.
    #[must_use]
    pub fn with_sweep_interval(interval: u64) -> Self {
        Self {
            counters: DashMap::new(),
            increments: AtomicU64::new(0),
            sweep_interval: interval.max(1),
        }
    }

    /// Returns the live count for `key` as of `now`.
    #[must_use]
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<u64> {
        self.counters
            .get(key)
            .filter(|counter| counter.expires_at > now)
            .map(|counter| counter.count)
    }

    /// Drops every counter expired as of `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.expires_at > now);
        before - self.counters.len()
    }

    /// Returns the number of stored counters, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns `true` if no counters are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(
        &self,
        key: &str,
        ttl: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let count = {
            // The entry guard holds the shard lock, so read-modify-write is atomic.
            let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
                count: 0,
                expires_at: now + ttl,
            });

            if entry.expires_at <= now {
                *entry = Counter {
                    count: 0,
                    expires_at: now + ttl,
                };
            }

            entry.count += 1;
            entry.count
        };

        // The guard must be dropped first; `retain` locks every shard.
        let done = self.increments.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.sweep_interval == 0 {
            let removed = self.purge_expired(now);
            tracing::debug!(removed, remaining = self.counters.len(), "swept expired counters");
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let store = MemoryCounterStore::new();
        let ttl = TimeDelta::seconds(60);

        assert_eq!(store.increment("k", ttl, at(0)).await.unwrap(), 1);
        assert_eq!(store.increment("k", ttl, at(10)).await.unwrap(), 2);
        assert_eq!(store.increment("other", ttl, at(10)).await.unwrap(), 1);
        assert_eq!(store.get("k", at(20)), Some(2));
    }

    #[tokio::test]
    async fn test_expiry_set_only_on_creation() {
        let store = MemoryCounterStore::new();
        let ttl = TimeDelta::seconds(60);

        store.increment("k", ttl, at(0)).await.unwrap();
        store.increment("k", ttl, at(59_000)).await.unwrap();

        // Still bound to the first expiry, not extended by the second call.
        assert_eq!(store.get("k", at(59_999)), Some(2));
        assert_eq!(store.get("k", at(60_000)), None);
        assert_eq!(store.increment("k", ttl, at(60_000)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryCounterStore::new();
        store
            .increment("short", TimeDelta::seconds(1), at(0))
            .await
            .unwrap();
        store
            .increment("long", TimeDelta::seconds(100), at(0))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(at(5_000)), 1);
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_keeps_store_bounded_across_windows() {
        let store = MemoryCounterStore::with_sweep_interval(10);
        let ttl = TimeDelta::seconds(60);

        for minute in 0..1_000_i64 {
            let key = format!("rl#a#p#1m#{minute}");
            store.increment(&key, ttl, at(minute * 60_000)).await.unwrap();
            assert!(store.len() <= 10, "len {} at minute {minute}", store.len());
        }
        // The last call (the 1000th) swept everything but its own window.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_default_sweep_interval_bounds_growth() {
        let store = MemoryCounterStore::new();
        let ttl = TimeDelta::seconds(60);

        for minute in 0..3_000_i64 {
            let key = format!("rl#a#p#1m#{minute}");
            store.increment(&key, ttl, at(minute * 60_000)).await.unwrap();
        }
        assert!(store.len() <= usize::try_from(DEFAULT_SWEEP_INTERVAL).unwrap());
    }

    #[tokio::test]
    async fn test_sweep_spares_live_counters() {
        let store = MemoryCounterStore::with_sweep_interval(2);
        let hour = TimeDelta::hours(1);

        store.increment("live", hour, at(0)).await.unwrap();
        store.increment("dead", TimeDelta::seconds(1), at(0)).await.unwrap();
        store.increment("fresh", hour, at(5_000)).await.unwrap();
        store.increment("fresh", hour, at(5_000)).await.unwrap();

        assert_eq!(store.get("live", at(5_000)), Some(1));
        assert_eq!(store.get("fresh", at(5_000)), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryCounterStore::new());
        let ttl = TimeDelta::seconds(60);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.increment("k", ttl, at(0)).await.unwrap() })
            })
            .collect();

        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=50).collect::<Vec<_>>());
    }
}
