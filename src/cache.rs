//! TTL and capacity bounded lookup cache
//!
//! Sits in front of the entry store so identical queries within a short
//! window skip the disk load and the scoring pass. Expiry is lazy: an entry
//! is checked when read and dropped then, with no background sweeper. The
//! number of resident entries never exceeds the capacity; when full, expired
//! entries are dropped first, then the least recently used one.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached value and when it stops being valid
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,

    /// `None` when the TTL reaches past what `Instant` can represent
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map_or(false, |expires_at| Instant::now() >= expires_at)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently resident, including expired ones not yet read
    pub size: usize,

    /// Maximum number of resident entries
    pub capacity: usize,

    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of capacity in use
    pub fn utilization(&self) -> f32 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f32 / self.capacity as f32
        }
    }

    pub fn hit_rate(&self) -> f32 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f32 / lookups as f32
        }
    }
}

/// String-keyed cache with per-entry TTL and LRU eviction
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache; a capacity of zero is raised to one
    pub fn new(default_ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Value under `key` if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Cache entry expired: {}", key);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace `key`, using `ttl` or else the default TTL
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let entry = CacheEntry::new(value, ttl.unwrap_or(self.default_ttl));
        let mut entries = self.lock();

        let replacing = entries.contains(&key);
        if !replacing && entries.len() >= entries.cap().get() {
            Self::drop_expired(&mut entries);
        }
        if let Some((evicted, _)) = entries.push(key, entry) {
            if !replacing {
                debug!("Cache evicted: {}", evicted);
            }
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop expired entries now instead of on their next read
    pub fn purge_expired(&self) -> usize {
        Self::drop_expired(&mut self.lock())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            size: entries.len(),
            capacity: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn drop_expired(entries: &mut LruCache<String, CacheEntry<V>>) -> usize {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}
