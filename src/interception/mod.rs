//! Interception Module
//!
//! Declarative per-route response caching for axum routers.

mod interceptor;
mod policy;

pub use interceptor::{cache_interceptor, CacheLayer, CachedResponse, X_CACHE};
pub use policy::{CacheCondition, CachePolicy, PolicyRegistry, RequestSnapshot, ResponseSnapshot};
