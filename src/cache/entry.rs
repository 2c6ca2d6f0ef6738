//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL and size metadata,
//! and the snapshot shape they are persisted in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// == Snapshot ==
/// Full cache contents as `(key, entry)` pairs, least recently used first.
///
/// Re-inserting the pairs in order restores the recency order.
pub type Snapshot<K, V> = Vec<(K, CacheEntry<V>)>;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Serialized with camelCase field names. Fields this version does not know
/// about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp (Unix milliseconds); TTL is measured from here
    #[serde(alias = "start")]
    pub inserted_at: u64,
    /// Last read or write (Unix milliseconds)
    #[serde(default)]
    pub last_accessed_at: u64,
    /// Time to live in milliseconds, None = no expiration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Cost of this entry against `max_size`
    #[serde(default = "default_size")]
    pub size: u64,
    /// Unrecognized fields from a newer snapshot
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_size() -> u64 {
    1
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry inserted at `now_ms`.
    ///
    /// A TTL of zero is treated as no TTL.
    pub fn new(value: V, now_ms: u64, ttl_ms: Option<u64>, size: u64) -> Self {
        Self {
            value,
            inserted_at: now_ms,
            last_accessed_at: now_ms,
            ttl: ttl_ms.filter(|ttl| *ttl > 0),
            size,
            extra: BTreeMap::new(),
        }
    }

    // == Is Stale ==
    /// Checks if the entry's TTL has elapsed at `now_ms`.
    ///
    /// An entry is stale once strictly more than `ttl` milliseconds have passed
    /// since insertion; at exactly `inserted_at + ttl` it is still fresh.
    pub fn is_stale(&self, now_ms: u64) -> bool {
        match self.ttl {
            Some(ttl) if ttl > 0 => now_ms.saturating_sub(self.inserted_at) > ttl,
            _ => false,
        }
    }

    // == Expires At ==
    /// Returns the last instant (Unix milliseconds) at which the entry is fresh.
    pub fn expires_at(&self) -> Option<u64> {
        self.ttl
            .filter(|ttl| *ttl > 0)
            .map(|ttl| self.inserted_at.saturating_add(ttl))
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry is stale
    /// - `Some(remaining_ms)` if the entry has TTL and is still fresh
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at()
            .map(|expires| expires.saturating_sub(now_ms))
    }

    /// Records an access at `now_ms`.
    pub(crate) fn touch(&mut self, now_ms: u64) {
        self.last_accessed_at = now_ms;
    }

    /// Restarts the TTL window at `now_ms`.
    pub(crate) fn reset_age(&mut self, now_ms: u64) {
        self.inserted_at = now_ms;
    }
}
