//! Stale Purge Task
//!
//! Background task that periodically removes expired entries and persists
//! the cache when anything was removed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::api::ServedCache;

/// Spawns a background task that periodically purges stale cache entries.
///
/// Each run takes the write lock on the blocking pool, so a purge and its
/// snapshot write never interleave with a request's mutation and never hold
/// up an async worker. A failed write is logged and
/// retried implicitly by the next mutation or purge.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_purge_task(cache: Arc<RwLock<ServedCache>>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting stale purge task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            // The purge may write the snapshot, so it runs on the blocking pool
            let shared = cache.clone();
            let result = tokio::task::spawn_blocking(move || {
                let mut cache_guard = shared.blocking_write();
                cache_guard.purge_stale()
            })
            .await;

            match result {
                Ok(Ok(0)) => debug!("Stale purge: no expired entries found"),
                Ok(Ok(removed)) => info!("Stale purge: removed {} expired entries", removed),
                Ok(Err(e)) => {
                    error!(error = %e, "Stale purge removed entries but failed to persist")
                }
                Err(e) => error!(error = %e, "Stale purge task failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOptions, ManualClock, SetOptions};
    use crate::persist::{MemoryStorage, PersistOptions, PersistentCache, Storage};

    fn shared_cache() -> (Arc<RwLock<ServedCache>>, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(0));
        let shared: Arc<dyn Storage> = storage.clone();
        let cache = PersistentCache::open_with_clock(
            PersistOptions::new("purge.json", CacheOptions::with_max_entries(100)),
            shared,
            clock.clone(),
        )
        .unwrap();
        (Arc::new(RwLock::new(cache)), storage, clock)
    }

    #[tokio::test]
    async fn test_purge_task_removes_and_persists_expired_entries() {
        let (cache, storage, clock) = shared_cache();
        {
            let mut guard = cache.write().await;
            guard
                .set(
                    "expire_soon".to_string(),
                    serde_json::json!("value"),
                    SetOptions::ttl(Duration::from_millis(100)),
                )
                .unwrap();
        }
        clock.set(200);

        let handle = spawn_purge_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let guard = cache.read().await;
            assert!(!guard.has("expire_soon"));
            assert_eq!(storage.raw(guard.path()).as_deref().map(str::trim), Some("[]"));
        }
        assert_eq!(storage.write_count(), 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_valid_entries() {
        let (cache, storage, _clock) = shared_cache();
        {
            let mut guard = cache.write().await;
            guard
                .set(
                    "long_lived".to_string(),
                    serde_json::json!(1),
                    SetOptions::ttl(Duration::from_secs(3600)),
                )
                .unwrap();
        }

        let handle = spawn_purge_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(cache.read().await.has("long_lived"));
        assert_eq!(storage.write_count(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_can_be_aborted() {
        let (cache, _, _) = shared_cache();

        let handle = spawn_purge_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }

    #[tokio::test]
    async fn test_purge_write_runs_off_the_runtime_thread() {
        let (cache, storage, clock) = shared_cache();
        {
            let mut guard = cache.write().await;
            guard
                .set(
                    "expire_soon".to_string(),
                    serde_json::json!("value"),
                    SetOptions::ttl(Duration::from_millis(100)),
                )
                .unwrap();
        }
        clock.set(200);
        storage.set_write_delay(Duration::from_millis(1_000));

        let handle = spawn_purge_task(cache.clone(), 1);

        // First purge starts at ~1s and its write blocks until ~2s
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(1_300)).await;
        assert!(started.elapsed() < Duration::from_millis(1_800));

        handle.abort();
    }
}
