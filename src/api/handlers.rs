//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, DumpResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse,
};
use crate::persist::{FsStorage, PersistentCache, Storage};

/// The cache served over HTTP: string keys, arbitrary JSON values.
pub type ServedCache = PersistentCache<String, Value, Arc<dyn Storage>>;

/// Application state shared across all handlers.
///
/// The write lock is held across each mutation and its snapshot write, so
/// two mutations never interleave.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<RwLock<ServedCache>>,
}

impl AppState {
    /// Creates a new AppState around an opened cache.
    pub fn new(cache: ServedCache) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Opens the configured cache on the file system.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = Arc::new(FsStorage::new());
        let cache = PersistentCache::open(config.persist_options(), storage)?;
        Ok(Self::new(cache))
    }
}

/// Runs `op` against the cache under the write lock on the blocking pool.
///
/// Mutations write the snapshot to disk before returning, so they must not
/// run on an async worker.
async fn with_cache<T, F>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(&mut ServedCache) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let cache = state.cache.clone();
    tokio::task::spawn_blocking(move || {
        let mut cache = cache.blocking_write();
        op(&mut cache)
    })
    .await?
}

/// Handler for PUT /set
///
/// Stores a value with optional TTL and size, then persists the cache.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let opts = req.set_options();
    let key = req.key.clone();
    let (stored, max_size) = with_cache(&state, move |cache| {
        let stored = cache.set(req.key, req.value, opts)?;
        Ok((stored, cache.inner().options().max_size))
    })
    .await?;

    if !stored {
        return Err(CacheError::InvalidRequest(format!(
            "Entry for '{}' is larger than the cache's max_size ({})",
            key,
            max_size.unwrap_or(u64::MAX)
        )));
    }

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /get/:key
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a hit updates recency and stats
    let mut cache = state.cache.write().await;
    let now = cache.inner().now_ms();
    let entry = cache
        .get_entry(key.as_str())
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;
    let ttl_remaining = entry.ttl_remaining_ms(now);
    let value = entry.value.clone();

    Ok(Json(GetResponse::new(key, value).with_ttl_remaining(ttl_remaining)))
}

/// Handler for DELETE /del/:key
///
/// The snapshot is rewritten even when the key was absent.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    let removed = with_cache(&state, move |cache| cache.delete(target.as_str())).await?;
    if !removed {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let cleared = with_cache(&state, |cache| {
        let cleared = cache.len();
        cache.clear()?;
        Ok(cleared)
    })
    .await?;

    Ok(Json(ClearResponse::new(cleared)))
}

/// Handler for POST /dump
///
/// Writes the current snapshot, including recency changes made by reads.
pub async fn dump_handler(State(state): State<AppState>) -> Result<Json<DumpResponse>> {
    let (path, entries) = with_cache(&state, |cache| {
        cache.dump()?;
        Ok((cache.path().display().to_string(), cache.len()))
    })
    .await?;

    Ok(Json(DumpResponse::new(path, entries)))
}

/// Handler for GET /snapshot
///
/// Returns the in-memory snapshot, least recently used first.
pub async fn snapshot_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    let cache = state.cache.read().await;
    let snapshot = serde_json::to_value(cache.snapshot())?;

    Ok(Json(snapshot))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    Json(StatsResponse::from(cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
