//! Cache Options Module
//!
//! Capacity, TTL and read-policy settings for a `CacheStore`.

use std::time::Duration;

use crate::error::{CacheError, Result};

// == Stale Read Policy ==
/// What `get` does with an entry whose TTL has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaleRead {
    /// Evict the entry and report a miss
    #[default]
    Evict,
    /// Return the entry anyway and leave removal to `purge_stale`
    Return,
}

// == Cache Options ==
/// Construction-time settings for a `CacheStore`.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Maximum number of entries, None = unbounded count
    pub max_entries: Option<usize>,
    /// Maximum total accounted size, None = unbounded size
    pub max_size: Option<u64>,
    /// TTL for entries set without an explicit one
    pub default_ttl: Option<Duration>,
    /// Whether a read hit moves the entry to most recently used
    pub update_recency_on_get: bool,
    /// Whether a read hit restarts the entry's TTL window
    pub update_age_on_get: bool,
    /// Handling of stale entries on read
    pub stale_read: StaleRead,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entries: Some(1000),
            max_size: None,
            default_ttl: None,
            update_recency_on_get: true,
            update_age_on_get: false,
            stale_read: StaleRead::Evict,
        }
    }
}

impl CacheOptions {
    /// Options bounded by item count only.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
            ..Self::default()
        }
    }

    /// Options bounded by total size only.
    pub fn with_max_size(max_size: u64) -> Self {
        Self {
            max_entries: None,
            max_size: Some(max_size),
            ..Self::default()
        }
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn stale_read(mut self, policy: StaleRead) -> Self {
        self.stale_read = policy;
        self
    }

    pub fn update_recency_on_get(mut self, enabled: bool) -> Self {
        self.update_recency_on_get = enabled;
        self
    }

    pub fn update_age_on_get(mut self, enabled: bool) -> Self {
        self.update_age_on_get = enabled;
        self
    }

    // == Validate ==
    /// Rejects zero bounds and caches with no bound at all.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == Some(0) {
            return Err(CacheError::InvalidConfig(
                "max_entries must be greater than zero".to_string(),
            ));
        }
        if self.max_size == Some(0) {
            return Err(CacheError::InvalidConfig(
                "max_size must be greater than zero".to_string(),
            ));
        }
        let has_ttl = self.default_ttl.is_some_and(|ttl| !ttl.is_zero());
        if self.max_entries.is_none() && self.max_size.is_none() && !has_ttl {
            return Err(CacheError::InvalidConfig(
                "at least one of max_entries, max_size or default_ttl is required".to_string(),
            ));
        }
        Ok(())
    }
}

// == Set Options ==
/// Per-entry overrides for `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL for this entry; falls back to the cache default
    pub ttl: Option<Duration>,
    /// Size of this entry; defaults to 1
    pub size: Option<u64>,
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            size: None,
        }
    }

    pub fn size(size: u64) -> Self {
        Self {
            ttl: None,
            size: Some(size),
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Converts a TTL to whole milliseconds, rounding up.
///
/// A non-zero TTL never becomes zero (which would mean "no TTL"), and one too
/// long for `u64` milliseconds saturates.
pub(crate) fn ttl_to_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
