//! fs_cache - A bounded LRU/TTL cache that survives restarts
//!
//! The cache lives in memory and is written to a JSON snapshot after every
//! mutation; on startup the snapshot is loaded and stale entries are purged.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persist;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheEntry, CacheOptions, CacheStore, SetOptions, Snapshot, StaleRead};
pub use config::Config;
pub use error::{CacheError, Result};
pub use persist::{FsStorage, MemoryStorage, PersistOptions, PersistentCache, Storage};
pub use tasks::spawn_purge_task;
