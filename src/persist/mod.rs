//! Persistence Module
//!
//! Keeps a `CacheStore` synchronized with a JSON snapshot on disk.
//!
//! # Snapshot Format
//!
//! ```text
//! [
//!   ["key", { "value": ..., "insertedAt": 1700000000000, "lastAccessedAt": ..., "ttl": 60000, "size": 1 }],
//!   ...
//! ]
//! ```
//!
//! Pairs are ordered least recently used first. Unknown entry fields are kept.

mod adapter;
mod storage;

pub use adapter::{PersistOptions, PersistentCache};
pub use storage::{FsStorage, MemoryStorage, Storage};
