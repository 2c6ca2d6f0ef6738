//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, dump_handler, get_handler, health_handler, set_handler,
    snapshot_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a key-value pair
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Delete a key
/// - `DELETE /clear` - Remove every entry
/// - `POST /dump` - Write the snapshot now
/// - `GET /snapshot` - Current snapshot, least recently used first
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/clear", delete(clear_handler))
        .route("/dump", post(dump_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::persist::{MemoryStorage, PersistOptions, PersistentCache, Storage};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let cache = PersistentCache::open(
            PersistOptions::new("routes.json", CacheOptions::with_max_entries(100)),
            storage,
        )
        .unwrap();
        create_router(AppState::new(cache))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Body) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let status = send(create_test_app(), "GET", "/health", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let status = send(create_test_app(), "GET", "/stats", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let body = Body::from(r#"{"key":"test","value":"hello"}"#);
        let status = send(create_test_app(), "PUT", "/set", body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let status = send(create_test_app(), "GET", "/get/nonexistent", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_and_dump_endpoints() {
        let app = create_test_app();
        assert_eq!(
            send(app.clone(), "DELETE", "/clear", Body::empty()).await,
            StatusCode::OK
        );
        assert_eq!(
            send(app, "POST", "/dump", Body::empty()).await,
            StatusCode::OK
        );
    }
}
