//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each admin endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use coldstorage::{api::create_router, AppState, ColdStorage, Config, MemoryBlobStore};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> (Router, MemoryBlobStore) {
    let blobs = MemoryBlobStore::new();
    let cache = ColdStorage::initialize(Config::default(), Arc::new(blobs.clone())).unwrap();
    (create_router(AppState::new(cache)), blobs)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri("/set")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(set_request(r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_empty_key_rejected() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(set_request(r#"{"key":"","value":"v"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_set_endpoint_malformed_json() {
    let (app, _) = create_test_app();

    let response = app.oneshot(set_request(r#"{"key":"k""#)).await.unwrap();

    assert!(response.status().is_client_error());
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_set_then_get() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(set_request(r#"{"key":"greeting","value":"hello"}"#))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("GET", "/get/greeting"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "greeting");
    assert_eq!(json["value"], "hello");
}

#[tokio::test]
async fn test_get_expired_key_returns_not_found() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(set_request(r#"{"key":"short","value":"v","ttl_ms":50}"#))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let response = app
        .oneshot(empty_request("GET", "/get/short"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_missing_key_returns_not_found() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/get/missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("missing"));
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(set_request(r#"{"key":"gone","value":"v"}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/del/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("DELETE", "/del/gone"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Commit / Clear Endpoint Tests ==

#[tokio::test]
async fn test_commit_endpoint_persists_fresh_entries() {
    let (app, blobs) = create_test_app();

    app.clone()
        .oneshot(set_request(r#"{"key":"a","value":"1"}"#))
        .await
        .unwrap();
    app.clone()
        .oneshot(set_request(r#"{"key":"b","value":"2","ttl_ms":1}"#))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let response = app
        .oneshot(empty_request("POST", "/commit"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["written"], 1);
    assert_eq!(json["stale"], 1);
    assert_eq!(blobs.len(), 1);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(set_request(r#"{"key":"a","value":"1"}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/clear"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 1);

    let response = app
        .oneshot(empty_request("GET", "/get/a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Stats / Health Endpoint Tests ==

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let (app, _) = create_test_app();

    app.clone()
        .oneshot(set_request(r#"{"key":"k","value":"v"}"#))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty_request("GET", "/get/k"))
        .await
        .unwrap();
    app.clone()
        .oneshot(empty_request("GET", "/get/nope"))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["estimated_bytes"], 38);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["ready"].is_boolean());
    assert!(json.get("timestamp").is_some());
}
