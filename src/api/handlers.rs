//! API Handlers
//!
//! HTTP request handlers for the cache management endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::invalidation::{CacheEvent, InvalidationCoordinator, InvalidationReport};
use crate::models::{HealthResponse, InvalidateRequest, KeyInfoResponse, KeysQuery};
use crate::storage::{
    BackendKind, CleanupOptions, CleanupReport, StorageEngine, StorageOperationResult,
    StorageStats, TTL_MISSING,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<StorageEngine>,
    pub coordinator: InvalidationCoordinator,
}

impl AppState {
    pub fn new(engine: Arc<StorageEngine>) -> Self {
        Self {
            coordinator: InvalidationCoordinator::new(engine.clone()),
            engine,
        }
    }
}

/// Passes a successful envelope through; a failed one becomes a 503.
fn envelope<T: Serialize>(result: StorageOperationResult<T>) -> Result<Json<StorageOperationResult<T>>> {
    if result.success {
        Ok(Json(result))
    } else {
        Err(StorageError::Unavailable(result.error.unwrap_or_default()))
    }
}

/// Handler for GET /admin/cache/stats
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<StorageOperationResult<StorageStats>>> {
    envelope(state.engine.stats().await)
}

/// Handler for GET /admin/cache/keys
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> Result<Json<StorageOperationResult<Vec<String>>>> {
    envelope(state.engine.keys(query.pattern()).await)
}

/// Handler for DELETE /admin/cache
pub async fn clear_handler(
    State(state): State<AppState>,
) -> Result<Json<StorageOperationResult<usize>>> {
    envelope(state.engine.clear().await)
}

/// Handler for GET /admin/cache/keys/:key
///
/// Reports whether one key exists and its remaining TTL.
pub async fn key_info_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<KeyInfoResponse>> {
    let exists = envelope(state.engine.exists(&key).await)?.0;
    let ttl = envelope(state.engine.get_ttl(&key).await)?.0;

    Ok(Json(KeyInfoResponse::new(
        key,
        exists.data.unwrap_or(false),
        ttl.data.unwrap_or(TTL_MISSING),
    )))
}

/// Handler for POST /admin/cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<StorageOperationResult<usize>>> {
    if let Some(error_msg) = req.validate() {
        return Err(StorageError::InvalidRequest(error_msg));
    }

    let result = envelope(state.engine.invalidate_pattern(&req.pattern).await)?;
    info!(pattern = %req.pattern, removed = ?result.data, "Pattern invalidated via admin API");
    Ok(result)
}

/// Handler for POST /admin/cache/events
pub async fn events_handler(
    State(state): State<AppState>,
    Json(event): Json<CacheEvent>,
) -> Json<InvalidationReport> {
    Json(state.coordinator.dispatch(&event).await)
}

/// Handler for POST /admin/cache/tags/:tag/invalidate
pub async fn tag_invalidate_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Json<InvalidationReport> {
    Json(state.coordinator.invalidate_tag(&tag).await)
}

/// Handler for POST /admin/cache/cleanup
pub async fn cleanup_handler(
    State(state): State<AppState>,
    Json(options): Json<CleanupOptions>,
) -> Result<Json<StorageOperationResult<CleanupReport>>> {
    let kind = state.engine.backend_kind();
    if kind != BackendKind::Memory {
        return Err(StorageError::Unsupported(kind.as_str()));
    }

    envelope(state.engine.cleanup(&options).await)
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.engine.backend_kind().as_str()))
}
