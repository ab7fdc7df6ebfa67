//! Per-subject grant cache with TTL expiry

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::set::GrantSet;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached subjects
    pub capacity: usize,

    /// Time-to-live of a subject's cached grants
    pub ttl: Duration,

    /// Upper bound on a single backing-store fetch
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(30 * 60),
            fetch_timeout: Duration::from_secs(2),
        }
    }
}

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    grants: Arc<GrantSet>,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(grants: Arc<GrantSet>) -> Self {
        Self {
            grants,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Snapshot of a subject's cache generation, taken before a fetch
///
/// A fill is only stored if neither the subject's generation nor the cache
/// epoch moved while the fetch was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeneration {
    epoch: u64,
    subject: u64,
}

/// Grant cache keyed by subject id
///
/// This is the explicit cache context handed to a [`super::GrantStore`];
/// nothing in the crate caches grants anywhere else. Entries expire
/// independently. Concurrent fills for the same subject overwrite each
/// other (last write wins), but a fill started before an invalidation of
/// that subject is discarded.
pub struct GrantCache {
    entries: Arc<DashMap<String, CachedEntry>>,
    /// Bumped on every invalidation; absent means 0
    generations: Arc<DashMap<String, u64>>,
    /// Bumped on `clear`
    epoch: Arc<AtomicU64>,
    ttl: Duration,
    capacity: usize,
    stats: Arc<DashMap<String, usize>>,
}

impl GrantCache {
    /// Create a cache
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            epoch: Arc::new(AtomicU64::new(0)),
            ttl,
            capacity: capacity.max(1),
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Create a cache from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.ttl, config.capacity)
    }

    /// Cached grants for a subject, if present and fresh
    pub fn get(&self, subject_id: &str) -> Option<Arc<GrantSet>> {
        if let Some(entry) = self.entries.get(subject_id) {
            if entry.is_expired(self.ttl) {
                drop(entry);
                // A fresh put may have landed since the guard was dropped
                let ttl = self.ttl;
                if self
                    .entries
                    .remove_if(subject_id, |_, entry| entry.is_expired(ttl))
                    .is_some()
                {
                    self.increment_stat("expirations");
                }
                self.increment_stat("misses");
                return None;
            }

            self.increment_stat("hits");
            return Some(entry.grants.clone());
        }

        self.increment_stat("misses");
        None
    }

    /// Current generation of a subject, to pass to [`GrantCache::put_if_current`]
    pub fn generation(&self, subject_id: &str) -> CacheGeneration {
        CacheGeneration {
            epoch: self.epoch.load(Ordering::SeqCst),
            subject: self.subject_generation(subject_id),
        }
    }

    /// Store a subject's grants unconditionally
    pub fn put(&self, subject_id: &str, grants: Arc<GrantSet>) {
        self.insert(subject_id, grants);
    }

    /// Store a subject's grants unless the subject was invalidated (or the
    /// cache cleared) after `generation` was taken
    ///
    /// # Returns
    ///
    /// `true` if the grants were kept in the cache
    pub fn put_if_current(&self, subject_id: &str, grants: Arc<GrantSet>, generation: CacheGeneration) -> bool {
        if !self.is_current(subject_id, generation) {
            self.increment_stat("stale_fills");
            return false;
        }

        self.insert(subject_id, grants.clone());

        // Invalidation bumps the generation before removing the entry, so an
        // invalidation racing the insert above is always seen here.
        if !self.is_current(subject_id, generation) {
            self.entries
                .remove_if(subject_id, |_, entry| Arc::ptr_eq(&entry.grants, &grants));
            self.increment_stat("stale_fills");
            return false;
        }

        true
    }

    /// Drop one subject's entry and reject fills already in flight
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed
    pub fn invalidate(&self, subject_id: &str) -> bool {
        *self.generations.entry(subject_id.to_string()).or_insert(0) += 1;

        let removed = self.entries.remove(subject_id).is_some();
        if removed {
            self.increment_stat("invalidations");
        }
        removed
    }

    /// Drop every entry and reject fills already in flight
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.generations.clear();
        self.entries.clear();
        self.stats.clear();
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            invalidations: self.get_stat("invalidations"),
            stale_fills: self.get_stat("stale_fills"),
            entries: self.entries.len(),
            max_entries: self.capacity,
        }
    }

    fn insert(&self, subject_id: &str, grants: Arc<GrantSet>) {
        if !self.entries.contains_key(subject_id) && self.entries.len() >= self.capacity {
            self.evict();
        }

        self.entries.insert(subject_id.to_string(), CachedEntry::new(grants));
    }

    fn is_current(&self, subject_id: &str, generation: CacheGeneration) -> bool {
        self.epoch.load(Ordering::SeqCst) == generation.epoch
            && self.subject_generation(subject_id) == generation.subject
    }

    fn subject_generation(&self, subject_id: &str) -> u64 {
        self.generations.get(subject_id).map(|g| *g).unwrap_or(0)
    }

    /// Expired entries go first; if none expired, the oldest entry is dropped
    fn evict(&self) {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        if self.entries.len() < before {
            return;
        }

        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().cached_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub invalidations: usize,
    pub stale_fills: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
