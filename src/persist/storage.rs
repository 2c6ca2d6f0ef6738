//! Snapshot Storage Module
//!
//! Narrow storage interface consumed by the persistent cache, with a file
//! system implementation and an in-memory one for tests.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

// == Storage Trait ==
/// Where snapshots live.
///
/// Reads never fail: anything that goes wrong degrades to `None` and is
/// logged. Writes report their failures.
pub trait Storage: Send + Sync {
    /// Produces the location for cache `name` under `dir`, preparing `dir`
    /// if needed. Never deletes anything.
    fn resolve(&self, name: &str, dir: Option<&Path>) -> Result<PathBuf>;

    /// Returns the parsed content at `path`, or `None` on any failure.
    fn read(&self, path: &Path) -> Option<Value>;

    /// Replaces the content at `path` with `value`.
    fn write(&self, path: &Path, value: &Value) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn resolve(&self, name: &str, dir: Option<&Path>) -> Result<PathBuf> {
        (**self).resolve(name, dir)
    }

    fn read(&self, path: &Path) -> Option<Value> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        (**self).write(path, value)
    }
}

// == File System Storage ==
/// Stores snapshots as pretty-printed JSON files.
///
/// The cache directory defaults to the user's home directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for FsStorage {
    fn resolve(&self, name: &str, dir: Option<&Path>) -> Result<PathBuf> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => dirs::home_dir().ok_or_else(|| CacheError::StorageLocation {
                path: PathBuf::from("~"),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "home directory could not be determined",
                ),
            })?,
        };

        if !dir.exists() {
            debug!(dir = %dir.display(), "Creating cache directory");
            fs::create_dir_all(&dir).map_err(|source| CacheError::StorageLocation {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(dir.join(name))
    }

    fn read(&self, path: &Path) -> Option<Value> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache snapshot on disk");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cache snapshot");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache snapshot is not valid JSON");
                None
            }
        }
    }

    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;

        // Write to a sibling temp file, then rename over the target
        let temp_path = temp_path_for(path);
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::write(path, e));
        }

        debug!(path = %path.display(), bytes = content.len(), "Wrote cache snapshot");
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

// == Memory Storage ==
/// Keeps raw snapshot text in memory.
///
/// Lets tests seed arbitrary (including malformed) content, inspect what was
/// written, and make writes fail or block on demand.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, String>>,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `path` with raw text.
    pub fn insert_raw(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files().insert(path.into(), text.into());
    }

    /// Returns the raw text stored at `path`.
    pub fn raw(&self, path: &Path) -> Option<String> {
        self.files().get(path).cloned()
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write block the calling thread for `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn resolve(&self, name: &str, dir: Option<&Path>) -> Result<PathBuf> {
        Ok(dir.unwrap_or_else(|| Path::new("/memory")).join(name))
    }

    fn read(&self, path: &Path) -> Option<Value> {
        let text = self.raw(path)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache snapshot is not valid JSON");
                None
            }
        }
    }

    fn write(&self, path: &Path, value: &Value) -> Result<()> {
        let delay_ms = self.write_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::write(
                path,
                std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            ));
        }
        let content = serde_json::to_string_pretty(value)?;
        self.files().insert(path.to_path_buf(), content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_fs_resolve_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("caches");

        let path = FsStorage.resolve("results.json", Some(&dir)).unwrap();

        assert!(dir.is_dir());
        assert_eq!(path, dir.join("results.json"));

        // Idempotent on an existing directory
        assert_eq!(FsStorage.resolve("results.json", Some(&dir)).unwrap(), path);
    }

    #[test]
    fn test_fs_read_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(FsStorage.read(&temp.path().join("absent.json")).is_none());
    }

    #[test]
    fn test_fs_read_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "[[\"a\", {").unwrap();

        assert!(FsStorage.read(&path).is_none());
    }

    #[test]
    fn test_fs_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        let value = json!([["k", {"value": 1, "insertedAt": 5}]]);

        FsStorage.write(&path, &value).unwrap();

        assert_eq!(FsStorage.read(&path), Some(value));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_fs_write_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing-dir").join("cache.json");

        let result = FsStorage.write(&path, &json!([]));

        assert!(matches!(result, Err(CacheError::StorageWrite { .. })));
    }

    #[test]
    fn test_temp_path_keeps_full_name() {
        assert_eq!(
            temp_path_for(Path::new("/a/cache.json")),
            PathBuf::from("/a/cache.json.tmp")
        );
        assert_eq!(temp_path_for(Path::new("/a/cache")), PathBuf::from("/a/cache.tmp"));
    }

    #[test]
    fn test_memory_storage_round_trip_and_failures() {
        let storage = MemoryStorage::new();
        let path = storage.resolve("c", None).unwrap();
        assert_eq!(path, PathBuf::from("/memory/c"));

        storage.write(&path, &json!({"a": 1})).unwrap();
        assert_eq!(storage.read(&path), Some(json!({"a": 1})));
        assert_eq!(storage.write_count(), 1);

        storage.set_fail_writes(true);
        assert!(storage.write(&path, &json!([])).is_err());
        assert_eq!(storage.write_count(), 1);

        storage.insert_raw(&path, "not json");
        assert!(storage.read(&path).is_none());
    }

    #[test]
    fn test_memory_write_delay() {
        let storage = MemoryStorage::new();
        storage.set_write_delay(Duration::from_millis(50));
        let path = Path::new("/memory/slow.json");

        let started = std::time::Instant::now();
        storage.write(path, &json!([])).unwrap();

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(storage.write_count(), 1);
    }
}
