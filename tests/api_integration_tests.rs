//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle through the management router and a
//! policy-cached business route.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use trivia_cache::identity::{attach_identity, ROLE_HEADER, SUBJECT_HEADER};
use trivia_cache::{
    cache_interceptor, create_router, AppState, CacheLayer, CachePolicy, PolicyRegistry,
    StorageConfig, StorageEngine, StorageValue,
};

// == Helper Functions ==

fn create_test_engine() -> Arc<StorageEngine> {
    Arc::new(StorageEngine::memory(StorageConfig::default()))
}

fn create_test_app(engine: Arc<StorageEngine>) -> Router {
    create_router(AppState::new(engine))
}

fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(SUBJECT_HEADER, "ops")
        .header(ROLE_HEADER, "admin");

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed(engine: &StorageEngine, keys: &[&str]) {
    for key in keys {
        engine.set(key, StorageValue::from(1i64), None).await;
    }
}

// == Stats Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let engine = create_test_engine();
    seed(&engine, &["a", "b"]).await;
    engine.get("a", None).await;
    engine.get("missing", None).await;

    let response = create_test_app(engine)
        .oneshot(admin_request("GET", "/admin/cache/stats", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["storage_type"], "cache");
    assert_eq!(json["data"]["total_items"], 2);
    assert_eq!(json["data"]["hits"], 1);
    assert_eq!(json["data"]["misses"], 1);
}

#[tokio::test]
async fn test_stats_endpoint_requires_admin() {
    let response = create_test_app(create_test_engine())
        .oneshot(
            Request::builder()
                .uri("/admin/cache/stats")
                .header(SUBJECT_HEADER, "u1")
                .header(ROLE_HEADER, "user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("Administrator"));
}

// == Keys Endpoint Tests ==

#[tokio::test]
async fn test_keys_endpoint_with_pattern() {
    let engine = create_test_engine();
    seed(&engine, &["leaderboard:weekly", "leaderboard:daily", "analytics:global-stats"]).await;

    let response = create_test_app(engine)
        .oneshot(admin_request("GET", "/admin/cache/keys?pattern=leaderboard:*", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"], json!(["leaderboard:daily", "leaderboard:weekly"]));
}

#[tokio::test]
async fn test_key_info_endpoint() {
    let engine = create_test_engine();
    engine.set("points:balance:u1", json!({"total": 10}), Some(1800)).await;
    engine.set("forever", StorageValue::Null, Some(0)).await;
    let app = create_test_app(engine);

    let response = app
        .clone()
        .oneshot(admin_request("GET", "/admin/cache/keys/points:balance:u1", None))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], true);
    assert_eq!(json["ttl"], 1800);

    let response = app
        .clone()
        .oneshot(admin_request("GET", "/admin/cache/keys/forever", None))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["ttl"], -2);

    let response = app
        .oneshot(admin_request("GET", "/admin/cache/keys/missing", None))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], false);
    assert_eq!(json["ttl"], -1);
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let engine = create_test_engine();
    engine.set("short", StorageValue::from("v"), Some(1)).await;
    let app = create_test_app(engine);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = app
        .oneshot(admin_request("GET", "/admin/cache/keys/short", None))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], false);
}

// == Clear / Invalidate Endpoint Tests ==

#[tokio::test]
async fn test_clear_endpoint() {
    let engine = create_test_engine();
    seed(&engine, &["a", "b", "c"]).await;

    let response = create_test_app(engine.clone())
        .oneshot(admin_request("DELETE", "/admin/cache", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"], 3);
    assert_eq!(engine.get_keys().await.data, Some(Vec::new()));
}

#[tokio::test]
async fn test_invalidate_endpoint() {
    let engine = create_test_engine();
    seed(&engine, &["a:1", "a:2", "b:1"]).await;

    let response = create_test_app(engine.clone())
        .oneshot(admin_request(
            "POST",
            "/admin/cache/invalidate",
            Some(json!({"pattern": "a:*"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"], 2);
    assert_eq!(engine.get_keys().await.data, Some(vec!["b:1".to_string()]));
}

#[tokio::test]
async fn test_invalidate_endpoint_empty_pattern() {
    let response = create_test_app(create_test_engine())
        .oneshot(admin_request(
            "POST",
            "/admin/cache/invalidate",
            Some(json!({"pattern": ""})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_json_request() {
    let response = create_test_app(create_test_engine())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/cache/invalidate")
                .header(SUBJECT_HEADER, "ops")
                .header(ROLE_HEADER, "admin")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Event Endpoint Tests ==

#[tokio::test]
async fn test_game_completed_event_endpoint() {
    let engine = create_test_engine();
    seed(
        &engine,
        &[
            "analytics:user:u1",
            "analytics:global-stats",
            "leaderboard:weekly",
            "games:history:u1",
            "games:history:u10",
        ],
    )
    .await;

    let response = create_test_app(engine.clone())
        .oneshot(admin_request(
            "POST",
            "/admin/cache/events",
            Some(json!({"event": "game_completed", "user_id": "u1"})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["attempted"], 5);
    assert_eq!(json["failed"], 0);
    assert_eq!(json["removed"], 4);
    assert_eq!(engine.get_keys().await.data, Some(vec!["games:history:u10".to_string()]));
}

#[tokio::test]
async fn test_unknown_event_is_rejected() {
    let response = create_test_app(create_test_engine())
        .oneshot(admin_request(
            "POST",
            "/admin/cache/events",
            Some(json!({"event": "server_rebooted"})),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Cleanup Endpoint Tests ==

#[tokio::test]
async fn test_cleanup_endpoint_dry_run() {
    let engine = create_test_engine();
    engine.set("short", StorageValue::from("v"), Some(1)).await;
    engine.set("long", StorageValue::from("v"), Some(600)).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let app = create_test_app(engine.clone());
    let response = app
        .clone()
        .oneshot(admin_request(
            "POST",
            "/admin/cache/cleanup",
            Some(json!({"dry_run": true})),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"]["expired"], 1);
    assert_eq!(json["data"]["dry_run"], true);

    let response = app
        .oneshot(admin_request("POST", "/admin/cache/cleanup", Some(json!({}))))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["data"]["expired"], 1);
    assert_eq!(engine.get_keys().await.data, Some(vec!["long".to_string()]));
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app(create_test_engine())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["backend"], "memory");
}

// == Route Caching Tests ==

#[tokio::test]
async fn test_catalog_route_served_from_cache_then_invalidated() {
    let engine = create_test_engine();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let catalog = Router::new()
        .route(
            "/credits/packages",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"packages": [{"id": "starter", "credits": 100}]}))
                }
            }),
        )
        .layer(middleware::from_fn_with_state(
            CacheLayer::new(
                engine.clone(),
                PolicyRegistry::new().route(
                    Method::GET,
                    "/credits/packages",
                    CachePolicy::ttl(60).tag("credits"),
                ),
            ),
            cache_interceptor,
        ))
        .layer(middleware::from_fn(attach_identity));
    let app = create_test_app(engine.clone()).merge(catalog);

    let fetch = || {
        Request::builder()
            .uri("/credits/packages")
            .header(SUBJECT_HEADER, "u1")
            .body(Body::empty())
            .unwrap()
    };

    let first = app.clone().oneshot(fetch()).await.unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");
    let first_body = body_to_json(first.into_body()).await;

    let second = app.clone().oneshot(fetch()).await.unwrap();
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(body_to_json(second.into_body()).await, first_body);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let response = app
        .clone()
        .oneshot(admin_request("POST", "/admin/cache/tags/credits/invalidate", None))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);

    let third = app.oneshot(fetch()).await.unwrap();
    assert_eq!(third.headers()["x-cache"], "MISS");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
