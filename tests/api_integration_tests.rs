//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against a cache
//! persisted in a temporary directory.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fs_cache::{
    api::create_router, AppState, CacheOptions, FsStorage, PersistOptions, PersistentCache,
    Storage,
};
use serde_json::{json, Value};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

fn open_state(dir: &TempDir) -> AppState {
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new());
    let options =
        PersistOptions::new("api.json", CacheOptions::with_max_entries(100)).in_dir(dir.path());
    AppState::new(PersistentCache::open(options, storage).unwrap())
}

fn create_test_app(dir: &TempDir) -> Router {
    create_router(open_state(dir))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn snapshot_file(dir: &TempDir) -> Value {
    let text = std::fs::read_to_string(dir.path().join("api.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

// == SET / GET ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = call(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "test_key", "value": "test_value"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("test_key"));
    assert_eq!(snapshot_file(&dir)[0][0], json!("test_key"));
}

#[tokio::test]
async fn test_get_endpoint_success() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    call(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "get_key", "value": {"exit": 0, "files": ["a.o"]}})),
    )
    .await;
    let (status, json) = call(&app, "GET", "/get/get_key", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "get_key");
    assert_eq!(json["value"], json!({"exit": 0, "files": ["a.o"]}));
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = call(&app, "GET", "/get/nonexistent_key", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nonexistent_key"));
}

// == DELETE / CLEAR ==

#[tokio::test]
async fn test_delete_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    call(&app, "PUT", "/set", Some(json!({"key": "delete_key", "value": 1}))).await;

    let (status, _) = call(&app, "DELETE", "/del/delete_key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot_file(&dir), json!([]));

    let (status, _) = call(&app, "GET", "/get/delete_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "DELETE", "/del/delete_key", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    for key in ["a", "b", "c"] {
        call(&app, "PUT", "/set", Some(json!({"key": key, "value": key}))).await;
    }

    let (status, json) = call(&app, "DELETE", "/clear", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cleared"], 3);
    assert_eq!(snapshot_file(&dir), json!([]));
}

// == Persistence Across Restarts ==

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let app = create_test_app(&dir);
        call(&app, "PUT", "/set", Some(json!({"key": "first", "value": 1}))).await;
        call(&app, "PUT", "/set", Some(json!({"key": "second", "value": 2}))).await;
        call(&app, "GET", "/get/first", None).await;
        let (status, _) = call(&app, "POST", "/dump", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let app = create_test_app(&dir);
    let (status, json) = call(&app, "GET", "/get/second", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], 2);

    let (_, snapshot) = call(&app, "GET", "/snapshot", None).await;
    let keys: Vec<&str> = snapshot
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| pair[0].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["first", "second"]);
}

// == Stats / Health ==

#[tokio::test]
async fn test_stats_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    call(&app, "PUT", "/set", Some(json!({"key": "stats_key", "value": "v", "size": 4}))).await;
    call(&app, "GET", "/get/stats_key", None).await;
    call(&app, "GET", "/get/nonexistent", None).await;

    let (status, json) = call(&app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["total_size"], 4);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = call(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Handling ==

#[tokio::test]
async fn test_invalid_json_request() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_key_request() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let (status, json) = call(&app, "PUT", "/set", Some(json!({"key": "", "value": 1}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
    assert!(!dir.path().join("api.json").exists());
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    call(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "ttl_test", "value": "short", "ttl": 1})),
    )
    .await;

    let (status, _) = call(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(status, StatusCode::OK);

    sleep(Duration::from_millis(1100));

    let (status, _) = call(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_extreme_ttl_and_size_via_api() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    for key in ["x", "y"] {
        let (status, _) = call(
            &app,
            "PUT",
            "/set",
            Some(json!({
                "key": key,
                "value": 1,
                "ttl": 18_446_744_073_709_552u64,
                "size": u64::MAX
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    sleep(Duration::from_millis(1100));

    let (status, json) = call(&app, "GET", "/get/x", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["ttl_remaining_ms"].as_u64().unwrap() > 1_000_000_000);

    let (_, stats) = call(&app, "GET", "/stats", None).await;
    assert_eq!(stats["total_size"], json!(u64::MAX));
}
