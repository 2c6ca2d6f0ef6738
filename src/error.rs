//! Error types for the persistent cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the persistent cache.
///
/// `NotFound` and `InvalidRequest` are only produced by the HTTP layer; the
/// cache itself signals absent keys with `None`/`false`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Capacity bounds rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The storage location could not be prepared
    #[error("Failed to prepare cache location {path}: {source}")]
    StorageLocation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the snapshot to storage failed
    #[error("Failed to write cache snapshot to {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded
    #[error("Failed to serialize cache snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A blocking cache operation panicked or was cancelled
    #[error("Cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CacheError {
    /// Builds a `StorageWrite` error for `path`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::StorageWrite {
            path: path.into(),
            source,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidConfig(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::StorageLocation { .. }
            | CacheError::StorageWrite { .. }
            | CacheError::Serialization(_)
            | CacheError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the persistent cache.
pub type Result<T> = std::result::Result<T, CacheError>;
