//! Cache Module
//!
//! Provides a bounded in-memory cache with LRU eviction, size accounting and
//! TTL expiration, plus the snapshot shape used to persist it.

mod clock;
mod entry;
mod lru;
mod options;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Snapshot};
pub use lru::LruTracker;
pub use options::{CacheOptions, SetOptions, StaleRead};
pub use stats::CacheStats;
pub use store::CacheStore;
