//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, size accounting
//! and TTL expiration.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::options::ttl_to_ms;
use crate::cache::{
    CacheEntry, CacheOptions, CacheStats, Clock, LruTracker, SetOptions, Snapshot, StaleRead,
    SystemClock,
};
use crate::error::Result;

// == Cache Store ==
/// Bounded cache with LRU eviction and TTL support.
///
/// Capacity is enforced on every insert: entries are evicted from the least
/// recently used end until both `max_entries` and `max_size` hold again.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Performance statistics
    stats: CacheStats,
    /// Sum of `size` over all entries; wider than `u64` so it cannot overflow
    total_size: u128,
    /// Capacity and policy settings
    options: CacheOptions,
    /// Time source for timestamps and staleness
    clock: Arc<dyn Clock>,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a new CacheStore reading the system clock.
    ///
    /// Fails with `CacheError::InvalidConfig` if the options carry a zero
    /// bound or no bound at all.
    pub fn new(options: CacheOptions) -> Result<Self> {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Creates a new CacheStore reading time from `clock`.
    pub fn with_clock(options: CacheOptions, clock: Arc<dyn Clock>) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            total_size: 0,
            options,
            clock,
        })
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Current time according to the store's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// See [`CacheStore::get_entry`].
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_entry(key).map(|entry| &entry.value)
    }

    /// Retrieves an entry by key.
    ///
    /// A hit records the access time and, unless disabled, moves the entry to
    /// the most recently used position. Stale entries are evicted and reported
    /// as misses under `StaleRead::Evict`, or returned as-is under
    /// `StaleRead::Return`.
    pub fn get_entry<Q>(&mut self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let stale = match self.entries.get(key) {
            Some(entry) => entry.is_stale(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if stale && self.options.stale_read == StaleRead::Evict {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            debug!("Evicted stale entry on read");
            return None;
        }

        if self.options.update_recency_on_get {
            self.lru.touch(key);
        }
        self.stats.record_hit();

        let reset_age = self.options.update_age_on_get && !stale;
        let entry = self.entries.get_mut(key)?;
        entry.touch(now);
        if reset_age {
            entry.reset_age(now);
        }
        Some(&*entry)
    }

    // == Peek ==
    /// Reads an entry without touching recency, timestamps or statistics.
    ///
    /// Stale entries are hidden unless the store returns stale reads.
    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.get(key)?;
        if entry.is_stale(self.clock.now_ms()) && self.options.stale_read == StaleRead::Evict {
            return None;
        }
        Some(entry)
    }

    // == Has ==
    /// Checks if a fresh entry exists for `key`.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_stale(self.clock.now_ms()))
    }

    // == Set ==
    /// Stores a key-value pair as the most recently used entry.
    ///
    /// Overwriting restarts the entry's TTL. The TTL falls back to the
    /// store's `default_ttl` and the size to 1.
    ///
    /// Returns false if the entry's size alone exceeds `max_size`; such an
    /// entry is never stored and any previous value under `key` is dropped.
    pub fn set(&mut self, key: K, value: V, opts: SetOptions) -> bool {
        let now = self.clock.now_ms();
        let size = opts.size.unwrap_or(1).max(1);

        if self.options.max_size.is_some_and(|max| size > max) {
            warn!(
                size,
                max_size = ?self.options.max_size,
                "Rejected cache entry larger than max_size"
            );
            self.remove_entry(&key);
            return false;
        }

        let ttl = opts.ttl.or(self.options.default_ttl).map(ttl_to_ms);
        self.insert_entry(key, CacheEntry::new(value, now, ttl, size));
        true
    }

    // == Delete ==
    /// Removes an entry by key, returning whether it was present.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.total_size = 0;
    }

    // == Load ==
    /// Replaces the contents with `snapshot`, oldest pair first.
    ///
    /// Timestamps are kept as persisted. When the snapshot holds more than
    /// the store allows, the oldest pairs are the ones dropped. Pairs too
    /// large to ever fit are skipped.
    pub fn load(&mut self, snapshot: Snapshot<K, V>) {
        self.clear();
        self.stats = CacheStats::new();

        let mut skipped = 0usize;
        for (key, mut entry) in snapshot {
            entry.size = entry.size.max(1);
            if self.options.max_size.is_some_and(|max| entry.size > max) {
                skipped += 1;
                continue;
            }
            if entry.last_accessed_at < entry.inserted_at {
                entry.last_accessed_at = entry.inserted_at;
            }
            self.insert_entry(key, entry);
        }

        if skipped > 0 {
            warn!(skipped, "Skipped snapshot entries larger than max_size");
        }
        debug!(
            entries = self.entries.len(),
            dropped = self.stats.evictions,
            "Loaded cache snapshot"
        );
    }

    // == Purge Stale ==
    /// Removes all entries whose TTL has elapsed.
    ///
    /// Returns the number of entries removed. Survivors keep their order.
    pub fn purge_stale(&mut self) -> usize {
        let now = self.clock.now_ms();
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_stale(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.remove_entry(key);
        }

        self.stats.record_expirations(stale.len());
        stale.len()
    }

    // == Dump ==
    /// Returns the current contents, least recently used first.
    pub fn dump(&self) -> Snapshot<K, V>
    where
        V: Clone,
    {
        self.lru
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(key)
                    .map(|entry| (key.clone(), entry.clone()))
            })
            .collect()
    }

    /// Iterates keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.lru.iter()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.total_size = self.total_size();
        stats
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the accounted size of all entries, saturating at `u64::MAX`.
    pub fn total_size(&self) -> u64 {
        u64::try_from(self.total_size).unwrap_or(u64::MAX)
    }

    // == Internals ==
    /// Inserts without touching the entry's timestamps, then restores bounds.
    fn insert_entry(&mut self, key: K, entry: CacheEntry<V>) {
        self.total_size += u128::from(entry.size);
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.total_size -= u128::from(previous.size);
        }
        self.lru.push(key);
        self.evict_overflow();
    }

    fn remove_entry<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.total_size -= u128::from(entry.size);
        Some(entry)
    }

    fn over_capacity(&self) -> bool {
        self.options
            .max_entries
            .is_some_and(|max| self.entries.len() > max)
            || self
                .options
                .max_size
                .is_some_and(|max| self.total_size > u128::from(max))
    }

    fn evict_overflow(&mut self) {
        while self.over_capacity() {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_size -= u128::from(entry.size);
                self.stats.record_eviction();
            }
        }
    }
}
