//! Integration Tests for the Redis Backend
//!
//! These run against a live server and are skipped unless `REDIS_URL` is set,
//! e.g. `REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_backend_tests`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use trivia_cache::storage::{BackendKind, CacheEntry, CleanupOptions, RedisBackend};
use trivia_cache::{InvalidationCoordinator, StorageConfig, StorageEngine, StorageValue};

// == Helper Functions ==

/// Engine on a fresh prefix, or None when no server is configured.
async fn remote_engine(test: &str) -> Option<StorageEngine> {
    let url = std::env::var("REDIS_URL").ok()?;
    let backend = RedisBackend::connect(&url)
        .await
        .expect("REDIS_URL is set but the server is unreachable");

    let engine = StorageEngine::with_backend(
        StorageConfig {
            prefix: format!("trivia-test:{test}:{}:", std::process::id()),
            ..StorageConfig::default()
        },
        Box::new(backend),
    );
    engine.clear().await;
    Some(engine)
}

#[tokio::test]
async fn test_round_trip_for_each_ttl() {
    let Some(engine) = remote_engine("round_trip").await else {
        return;
    };
    let value = StorageValue::from(json!({"total": 10, "tags": ["a", null, 2.5]}));

    for ttl in [None, Some(0), Some(60)] {
        assert!(engine.set("k", value.clone(), ttl).await.success);
        assert_eq!(engine.get("k", None).await.data, Some(value.clone()));
    }
    assert_eq!(engine.backend_kind(), BackendKind::Remote);

    engine.clear().await;
}

#[tokio::test]
async fn test_expiry_and_ttl_codes() {
    let Some(engine) = remote_engine("expiry").await else {
        return;
    };

    engine.set("short", "v", Some(1)).await;
    engine.set("forever", "v", Some(0)).await;

    assert_eq!(engine.get_ttl("short").await.data, Some(1));
    assert_eq!(engine.get_ttl("forever").await.data, Some(-2));
    assert_eq!(engine.get_ttl("missing").await.data, Some(-1));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert!(engine.get("short", None).await.data.is_none());
    assert_eq!(engine.get_ttl("short").await.data, Some(-1));

    assert_eq!(engine.set_ttl("forever", 30).await.data, Some(true));
    assert_eq!(engine.set_ttl("forever", 0).await.data, Some(true));
    assert_eq!(engine.get_ttl("forever").await.data, Some(-2));

    engine.clear().await;
}

#[tokio::test]
async fn test_pattern_invalidation_scans_and_counts() {
    let Some(engine) = remote_engine("pattern").await else {
        return;
    };

    engine.set("a:1", 1i64, None).await;
    engine.set("a:2", 2i64, None).await;
    engine.set("b:1", 3i64, None).await;

    assert_eq!(engine.invalidate_pattern("a:*").await.data, Some(2));
    assert_eq!(engine.get_keys().await.data, Some(vec!["b:1".to_string()]));

    engine.clear().await;
}

#[tokio::test]
async fn test_batch_increment_and_stats() {
    let Some(engine) = remote_engine("batch").await else {
        return;
    };

    engine
        .mset(vec![
            CacheEntry::new("x", 1i64, None),
            CacheEntry::new("y", "two", Some(60)),
        ])
        .await;

    let values = engine.mget(&["x", "missing", "y"]).await.data.unwrap();
    assert_eq!(
        values,
        vec![Some(StorageValue::from(1i64)), None, Some(StorageValue::from("two"))]
    );
    assert_eq!(engine.increment("x", 4).await.data, Some(5));

    let stats = engine.stats().await.data.unwrap();
    assert_eq!(stats.total_items, 2);
    assert_eq!(stats.total_size_bytes, 2 * 1024);
    assert_eq!(stats.hit_rate, 0.0);

    assert!(!engine.cleanup(&CleanupOptions::default()).await.success);

    engine.clear().await;
}

#[tokio::test]
async fn test_get_or_set_and_invalidation() {
    let Some(engine) = remote_engine("cache_aside").await else {
        return;
    };
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let total: Result<i64, ()> = engine
            .get_or_set(
                "analytics:user:u1",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                },
                Some(60),
                None,
            )
            .await;
        assert_eq!(total, Ok(42));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let engine = std::sync::Arc::new(engine);
    engine.set("leaderboard:weekly", 1i64, None).await;
    let report = InvalidationCoordinator::new(engine.clone())
        .on_game_complete("u1")
        .await;
    assert_eq!(report.failed, 0);
    assert_eq!(report.removed, 2);

    engine.clear().await;
}
