//! Persistent Cache Module
//!
//! Wraps a `CacheStore` so that its contents are loaded from storage at
//! startup and written back after every mutation.

use std::borrow::Borrow;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheOptions, CacheStats, CacheStore, Clock, SetOptions, Snapshot, SystemClock,
};
use crate::error::Result;
use crate::persist::Storage;

// == Persist Options ==
/// Where a persistent cache lives and how it is bounded.
#[derive(Debug, Clone)]
pub struct PersistOptions {
    /// Logical cache name, used as the snapshot file name
    pub cache_name: String,
    /// Directory holding the snapshot, None = storage default
    pub cache_dir: Option<PathBuf>,
    /// Options for the in-memory store
    pub cache: CacheOptions,
}

impl PersistOptions {
    pub fn new(cache_name: impl Into<String>, cache: CacheOptions) -> Self {
        Self {
            cache_name: cache_name.into(),
            cache_dir: None,
            cache,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

// == Persistent Cache ==
/// A `CacheStore` kept in sync with a snapshot in `Storage`.
///
/// Every `set`, `delete` and `clear` rewrites the full snapshot before
/// returning. A failed write is returned to the caller; the in-memory change
/// stays applied and disk catches up on the next successful write.
/// Reads never touch storage.
#[derive(Debug)]
pub struct PersistentCache<K, V, S> {
    store: CacheStore<K, V>,
    storage: S,
    path: PathBuf,
}

impl<K, V, S> PersistentCache<K, V, S>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
    S: Storage,
{
    // == Open ==
    /// Opens the cache, reading the system clock.
    pub fn open(options: PersistOptions, storage: S) -> Result<Self> {
        Self::open_with_clock(options, storage, Arc::new(SystemClock))
    }

    /// Opens the cache: load the snapshot, purge stale entries, and write
    /// back if the purge removed anything.
    ///
    /// A missing or unreadable snapshot starts an empty cache. Invalid
    /// options, an unusable location, or a failed post-purge write are
    /// returned as errors.
    pub fn open_with_clock(
        options: PersistOptions,
        storage: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut store = CacheStore::with_clock(options.cache, clock)?;
        let path = storage.resolve(&options.cache_name, options.cache_dir.as_deref())?;

        let snapshot = storage
            .read(&path)
            .map(decode_snapshot::<K, V>)
            .unwrap_or_default();
        let read = snapshot.len();
        store.load(snapshot);
        let purged = store.purge_stale();

        let cache = Self {
            store,
            storage,
            path,
        };
        if purged > 0 {
            cache.persist()?;
        }

        info!(
            path = %cache.path.display(),
            read,
            purged,
            entries = cache.store.len(),
            "Opened persistent cache"
        );
        Ok(cache)
    }

    // == Reads ==
    /// Retrieves a value and updates its recency. Never writes to storage.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get(key)
    }

    /// Retrieves an entry and updates its recency. Never writes to storage.
    pub fn get_entry<Q>(&mut self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.get_entry(key)
    }

    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.peek(key)
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.store.has(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.store.total_size()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    /// Current contents, least recently used first.
    pub fn snapshot(&self) -> Snapshot<K, V> {
        self.store.dump()
    }

    /// Location of the snapshot in storage.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying store, for read-only inspection.
    pub fn inner(&self) -> &CacheStore<K, V> {
        &self.store
    }

    // == Mutations ==
    /// Stores a value, then writes the snapshot.
    ///
    /// Returns whether the entry was stored (see [`CacheStore::set`]).
    pub fn set(&mut self, key: K, value: V, opts: SetOptions) -> Result<bool> {
        let stored = self.store.set(key, value, opts);
        self.persist()?;
        Ok(stored)
    }

    /// Removes a key, then writes the snapshot whether or not it existed.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.store.delete(key);
        self.persist()?;
        Ok(removed)
    }

    /// Removes every entry, then writes the (empty) snapshot.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear();
        self.persist()
    }

    /// Removes stale entries, writing the snapshot only if any were removed.
    pub fn purge_stale(&mut self) -> Result<usize> {
        let purged = self.store.purge_stale();
        if purged > 0 {
            self.persist()?;
        }
        Ok(purged)
    }

    /// Writes the current snapshot unconditionally.
    pub fn dump(&self) -> Result<()> {
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let value = serde_json::to_value(self.store.dump())?;
        self.storage.write(&self.path, &value)?;
        debug!(path = %self.path.display(), entries = self.store.len(), "Persisted cache");
        Ok(())
    }
}

// == Snapshot Decoding ==
/// Turns stored JSON into a snapshot, keeping every pair that parses.
fn decode_snapshot<K, V>(value: Value) -> Snapshot<K, V>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    let Value::Array(pairs) = value else {
        warn!("Cache snapshot is not an array of pairs, starting empty");
        return Vec::new();
    };

    let total = pairs.len();
    let snapshot: Snapshot<K, V> = pairs
        .into_iter()
        .filter_map(|pair| match serde_json::from_value(pair) {
            Ok(pair) => Some(pair),
            Err(e) => {
                debug!(error = %e, "Skipping malformed snapshot pair");
                None
            }
        })
        .collect();

    if snapshot.len() < total {
        warn!(
            skipped = total - snapshot.len(),
            "Skipped malformed pairs in cache snapshot"
        );
    }
    snapshot
}
