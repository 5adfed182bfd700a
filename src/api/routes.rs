//! API Routes
//!
//! Configures the Axum router for the cache management endpoints.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_handler, events_handler, health_handler, invalidate_handler,
    key_info_handler, keys_handler, stats_handler, tag_invalidate_handler, AppState,
};
use crate::identity::{attach_identity, require_admin};

/// Creates the management router.
///
/// # Endpoints
/// - `GET /admin/cache/stats` - Aggregate statistics
/// - `GET /admin/cache/keys?pattern=` - List keys matching a glob
/// - `GET /admin/cache/keys/:key` - Existence and TTL of one key
/// - `DELETE /admin/cache` - Remove every key under the prefix
/// - `POST /admin/cache/invalidate` - Pattern invalidation
/// - `POST /admin/cache/events` - Dispatch an invalidation event
/// - `POST /admin/cache/tags/:tag/invalidate` - Purge keys recorded under a tag
/// - `POST /admin/cache/cleanup` - Maintenance pass (memory backend)
/// - `GET /health` - Health check endpoint
///
/// Every `/admin` route requires the admin role.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/admin/cache", delete(clear_handler))
        .route("/admin/cache/stats", get(stats_handler))
        .route("/admin/cache/keys", get(keys_handler))
        .route("/admin/cache/keys/:key", get(key_info_handler))
        .route("/admin/cache/invalidate", post(invalidate_handler))
        .route("/admin/cache/events", post(events_handler))
        .route("/admin/cache/tags/:tag/invalidate", post(tag_invalidate_handler))
        .route("/admin/cache/cleanup", post(cleanup_handler))
        .route_layer(middleware::from_fn(require_admin));

    Router::new()
        .merge(admin)
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(attach_identity))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
