//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheOptions;
use crate::persist::PersistOptions;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Snapshot file name of the served cache
    pub cache_name: String,
    /// Directory holding the snapshot, None = home directory
    pub cache_dir: Option<PathBuf>,
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Maximum total entry size, None = unbounded
    pub max_size: Option<u64>,
    /// Default TTL in seconds for entries without explicit TTL, 0 = none
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background stale purge interval in seconds
    pub purge_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Snapshot file name (default: fs-cache.json)
    /// - `CACHE_DIR` - Snapshot directory (default: home directory)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `MAX_SIZE` - Maximum total entry size (default: unbounded)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `PURGE_INTERVAL` - Stale purge frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_name: env::var("CACHE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.cache_name),
            cache_dir: env::var_os("CACHE_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_size: parse_var("MAX_SIZE"),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            purge_interval: parse_var("PURGE_INTERVAL").unwrap_or(defaults.purge_interval),
        }
    }

    /// Builds the in-memory store options.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            max_entries: Some(self.max_entries),
            max_size: self.max_size,
            default_ttl: (self.default_ttl > 0).then(|| Duration::from_secs(self.default_ttl)),
            ..CacheOptions::default()
        }
    }

    /// Builds the persistence options.
    pub fn persist_options(&self) -> PersistOptions {
        PersistOptions {
            cache_name: self.cache_name.clone(),
            cache_dir: self.cache_dir.clone(),
            cache: self.cache_options(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_name: "fs-cache.json".to_string(),
            cache_dir: None,
            max_entries: 1000,
            max_size: None,
            default_ttl: 300,
            server_port: 3000,
            purge_interval: 1,
        }
    }
}
