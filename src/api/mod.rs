//! API Module
//!
//! HTTP handlers and routing for the cache management API.
//!
//! # Endpoints
//! - `GET /admin/cache/stats` - Aggregate statistics
//! - `GET /admin/cache/keys` - Key listing
//! - `GET /admin/cache/keys/:key` - Key inspection
//! - `DELETE /admin/cache` - Clear
//! - `POST /admin/cache/invalidate` - Pattern invalidation
//! - `POST /admin/cache/events` - Event dispatch
//! - `POST /admin/cache/tags/:tag/invalidate` - Tag invalidation
//! - `POST /admin/cache/cleanup` - Maintenance pass
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
