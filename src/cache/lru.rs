//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every access stamps the key with a fresh, strictly increasing tick, so
/// the order is total:
/// - Smallest tick = Least recently used
/// - Largest tick = Most recently used
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Keys by access tick
    order: BTreeMap<u64, K>,
    /// Current tick of each key
    ticks: HashMap<K, u64>,
    /// Next tick to hand out
    next_tick: u64,
}

impl<K> LruTracker<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            ticks: HashMap::new(),
            next_tick: 0,
        }
    }

    // == Push ==
    /// Marks a key as most recently used, adding it if untracked.
    pub fn push(&mut self, key: K) {
        if self.touch(&key) {
            return;
        }
        let tick = self.next_tick;
        self.next_tick += 1;
        self.order.insert(tick, key.clone());
        self.ticks.insert(key, tick);
    }

    // == Touch ==
    /// Moves an already tracked key to the most recently used position.
    ///
    /// Returns false if the key is not tracked.
    pub fn touch<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(tick) = self.ticks.get_mut(key) else {
            return false;
        };
        let current = *tick;
        let Some(owned) = self.order.remove(&current) else {
            return false;
        };
        *tick = self.next_tick;
        self.order.insert(self.next_tick, owned);
        self.next_tick += 1;
        true
    }

    // == Remove ==
    /// Removes a key from the tracker, returning whether it was tracked.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.ticks.remove(key) {
            Some(tick) => {
                self.order.remove(&tick);
                true
            }
            None => false,
        }
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.ticks.remove(&key);
        Some(key)
    }

    /// Iterates keys from least to most recently used.
    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.values()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
        self.ticks.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<K> Default for LruTracker<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
