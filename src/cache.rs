//! # Data cache
//! Bounded, shared key→value store with per-entry TTL and least-recently-used
//! eviction. Volatile and in-memory only; it exists to avoid redundant
//! provider calls.
//!
//! - Expiry is lazy: a read that finds an expired entry removes it and counts
//!   a miss plus an eviction. `cleanup_expired` purges proactively.
//! - Recency is the most recent `get` hit or `set`, not insertion time.
//! - Every structural mutation happens inside one mutex per cache instance.
//!   Stats snapshots take the same lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clock::{SharedClock, SystemClock};
use crate::metrics::{CACHE_EVICTIONS, CACHE_HITS, CACHE_MISSES, CACHE_SIZE};

pub const DEFAULT_MAX_SIZE: usize = 1000;
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Key fragment → TTL seconds. Checked in order; first match wins.
const CATEGORY_TTLS: [(&str, u64); 5] = [
    ("stock", 300),
    ("economic", 86_400),
    ("market_context", 1_800),
    ("fundamental", 14_400),
    ("sector", 900),
];

/// TTL for a key according to the domain category table, if any fragment matches.
pub fn ttl_for_key(key: &str) -> Option<u64> {
    let k = key.to_ascii_lowercase();
    CATEGORY_TTLS
        .iter()
        .find(|(needle, _)| k.contains(needle))
        .map(|&(_, secs)| secs)
}

/// A cached value plus its expiry bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub access_count: u64,
    /// Position in the recency index.
    touched: u64,
}

impl<V> CacheEntry<V> {
    /// Expired ⇔ now > created_at + ttl.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let ttl_ms = i64::try_from(self.ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        now.timestamp_millis() > self.created_at.timestamp_millis().saturating_add(ttl_ms)
    }
}

/// Monotonic counters plus current size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_size: usize,
}

impl CacheStats {
    /// hits / (hits + misses); 0.0 before the first access.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// touch tick → key; the first entry is the least recently used.
    recency: BTreeMap<u64, String>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> Inner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.touched);
        Some(entry)
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }

    fn assert_consistent(&self) {
        assert_eq!(
            self.entries.len(),
            self.recency.len(),
            "cache invariant violated: recency index out of sync with entries"
        );
    }
}

/// Thread-safe TTL + LRU cache.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    max_size: usize,
    default_ttl_secs: u64,
    clock: SharedClock,
}

pub type SharedCache<V> = Arc<TtlCache<V>>;

impl<V: Clone> TtlCache<V> {
    /// `max_size` is raised to at least 1.
    pub fn new(max_size: usize, default_ttl_secs: u64, clock: SharedClock) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                tick: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            max_size: max_size.max(1),
            default_ttl_secs,
            clock,
        }
    }

    /// Defaults (1000 entries, 1h TTL) on the wall clock.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL_SECS, Arc::new(SystemClock))
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().expect("cache mutex poisoned")
    }

    /// Live value for `key`, or `None` on a miss. A hit refreshes recency.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let Some(expired) = inner.entries.get(key).map(|e| e.is_expired(now)) else {
            inner.misses += 1;
            counter!(CACHE_MISSES).increment(1);
            return None;
        };

        if expired {
            inner.remove(key);
            inner.misses += 1;
            inner.evictions += 1;
            counter!(CACHE_MISSES).increment(1);
            counter!(CACHE_EVICTIONS).increment(1);
            gauge!(CACHE_SIZE).set(inner.entries.len() as f64);
            debug!(target: "cache", key, "expired on read");
            return None;
        }

        let tick = inner.next_tick();
        let Inner {
            entries, recency, ..
        } = &mut *inner;
        let entry = entries.get_mut(key)?;
        recency.remove(&entry.touched);
        recency.insert(tick, key.to_string());
        entry.touched = tick;
        entry.access_count += 1;
        let value = entry.value.clone();

        inner.hits += 1;
        counter!(CACHE_HITS).increment(1);
        Some(value)
    }

    /// Insert or replace. Without `ttl_secs` the TTL comes from the category
    /// table, then the configured default. A new key at capacity evicts
    /// exactly the least recently touched entry first.
    pub fn set(&self, key: &str, value: V, ttl_secs: Option<u64>) {
        let ttl = ttl_secs
            .or_else(|| ttl_for_key(key))
            .unwrap_or(self.default_ttl_secs);
        let now = self.clock.now();
        let mut inner = self.lock();

        let replaced = inner.remove(key).is_some();
        if !replaced && inner.entries.len() >= self.max_size {
            if let Some(evicted) = inner.evict_lru() {
                counter!(CACHE_EVICTIONS).increment(1);
                debug!(target: "cache", key = %evicted, "evicted least recently used");
            }
        }

        let tick = inner.next_tick();
        inner.recency.insert(tick, key.to_string());
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl_secs: ttl,
                access_count: 0,
                touched: tick,
            },
        );
        inner.assert_consistent();
        gauge!(CACHE_SIZE).set(inner.entries.len() as f64);
    }

    /// Remove `key`; returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.remove(key).is_some();
        gauge!(CACHE_SIZE).set(inner.entries.len() as f64);
        removed
    }

    /// Drop all entries. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
        gauge!(CACHE_SIZE).set(0.0);
    }

    /// Purge every expired entry; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        inner.evictions += expired.len() as u64;
        inner.assert_consistent();
        counter!(CACHE_EVICTIONS).increment(expired.len() as u64);
        gauge!(CACHE_SIZE).set(inner.entries.len() as f64);
        expired.len()
    }

    /// Presence of a live entry, without touching recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
            max_size: self.max_size,
        }
    }
}

/// Periodically purge expired entries until the returned handle is aborted.
pub fn spawn_cleanup_task<V>(cache: SharedCache<V>, every: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!(target: "cache", removed, size = cache.len(), "expired entries purged");
            }
        }
    })
}
