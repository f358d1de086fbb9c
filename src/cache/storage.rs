//! In-memory cache storage with per-type expiry
//!
//! Entries live in a mutex-guarded map keyed by [`cache_key`]. Expiry uses the
//! tokio clock so paused-time tests can step over TTL boundaries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::key::{Params, cache_key};
use super::{DataType, TtlPolicy};

/// A cached upstream response
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    data_type: DataType,
    created_at: Instant,
    expires_at: Instant,
    /// Key length plus serialized payload length
    size_bytes: usize,
}

impl CacheEntry {
    fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Thread-safe response cache with TTLs chosen per [`DataType`].
pub struct CacheStore {
    inner: Mutex<Inner>,
    ttl: TtlPolicy,
    max_entries: Option<usize>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(TtlPolicy::default())
    }
}

impl CacheStore {
    /// Create an unbounded store using the given TTL table
    pub fn new(ttl: TtlPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            max_entries: None,
        }
    }

    /// Cap the number of live entries. When full, expired entries are dropped
    /// first, then the entry closest to expiry.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get cached payload if present and not expired.
    ///
    /// An expired entry is evicted on the spot and counted as a miss.
    pub fn get(&self, endpoint: &str, params: &Params) -> Option<Value> {
        let key = cache_key(endpoint, params);
        let now = Instant::now();
        let mut inner = self.lock();

        let hit = inner
            .entries
            .get(&key)
            .filter(|entry| entry.is_valid_at(now))
            .map(|entry| (entry.payload.clone(), entry.expires_at - now));

        match hit {
            Some((payload, remaining)) => {
                inner.hits += 1;
                debug!(
                    "Cache hit: {} ({}s remaining)",
                    endpoint,
                    remaining.as_secs()
                );
                Some(payload)
            }
            None => {
                inner.misses += 1;
                if inner.entries.remove(&key).is_some() {
                    debug!("Cache entry expired: {}", endpoint);
                }
                None
            }
        }
    }

    /// Store a payload, overwriting any entry for the same key.
    ///
    /// Returns the data type the endpoint was classified as.
    pub fn set(&self, endpoint: &str, params: &Params, payload: Value) -> DataType {
        let key = cache_key(endpoint, params);
        let data_type = DataType::from_endpoint(endpoint);
        let ttl = self.ttl.ttl(data_type);
        let now = Instant::now();
        let size_bytes = key.len() + payload.to_string().len();

        let mut inner = self.lock();

        if let Some(max) = self.max_entries
            && !inner.entries.contains_key(&key)
        {
            make_room(&mut inner.entries, max, now);
        }

        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                data_type,
                created_at: now,
                expires_at: now + ttl,
                size_bytes,
            },
        );

        debug!(
            "Cache set: {} (type: {}, ttl: {}s)",
            endpoint,
            data_type,
            ttl.as_secs()
        );
        data_type
    }

    /// Remove every entry whose key contains `pattern`.
    ///
    /// Used to drop everything cached for one agent. An empty pattern removes
    /// nothing.
    pub fn invalidate(&self, pattern: &str) -> usize {
        if pattern.is_empty() {
            return 0;
        }

        let removed = self.remove_where(|key, _| key.contains(pattern));
        if removed > 0 {
            info!(
                "Invalidated {} cache entries matching '{}'",
                removed, pattern
            );
        }
        removed
    }

    /// Remove every entry classified as `data_type`.
    pub fn invalidate_by_type(&self, data_type: DataType) -> usize {
        let removed = self.remove_where(|_, entry| entry.data_type == data_type);
        if removed > 0 {
            info!(
                "Invalidated {} cache entries of type {}",
                removed, data_type
            );
        }
        removed
    }

    /// Remove every entry that has expired.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let removed = self.remove_where(|_, entry| !entry.is_valid_at(now));
        if removed > 0 {
            debug!("Cache sweep removed {} expired entries", removed);
        }
        removed
    }

    /// Drop every entry and reset the hit/miss counters.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.entries.len();
        *inner = Inner::default();
        removed
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.lock();

        let expired_entries = inner
            .entries
            .values()
            .filter(|entry| !entry.is_valid_at(now))
            .count();
        let memory_bytes = inner.entries.values().map(|e| e.size_bytes).sum();
        let oldest_entry_age = inner
            .entries
            .values()
            .map(|entry| now.saturating_duration_since(entry.created_at))
            .max();
        let lookups = inner.hits + inner.misses;

        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            lookups,
            hit_ratio: ratio(inner.hits, lookups),
            entries: inner.entries.len(),
            expired_entries,
            memory_bytes,
            oldest_entry_age_secs: oldest_entry_age.map(|age| age.as_secs()),
        }
    }

    /// Run [`sweep`](Self::sweep) every `period` until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.sweep();
            }
        })
    }

    fn remove_where(&self, mut predicate: impl FnMut(&str, &CacheEntry) -> bool) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, entry| !predicate(key, entry));
        before - inner.entries.len()
    }
}

/// Evict until there is room for one more entry.
fn make_room(entries: &mut HashMap<String, CacheEntry>, max: usize, now: Instant) {
    if entries.len() < max {
        return;
    }

    entries.retain(|_, entry| entry.is_valid_at(now));

    while entries.len() >= max {
        let victim = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                debug!("Cache full, evicting {}", key);
                entries.remove(&key);
            }
            None => break,
        }
    }
}

pub(crate) fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Statistics about cache state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub lookups: u64,
    /// `hits / lookups`, 0 when nothing was looked up
    pub hit_ratio: f64,
    pub entries: usize,
    pub expired_entries: usize,
    /// Approximate footprint: key plus serialized payload sizes
    pub memory_bytes: usize,
    pub oldest_entry_age_secs: Option<u64>,
}
