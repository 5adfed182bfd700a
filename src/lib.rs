//! Trivia Cache - caching engine for the trivia backend
//!
//! Memory and Redis storage backends behind one engine, cache-aside reads,
//! event-driven invalidation and declarative per-route response caching.

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod interception;
pub mod invalidation;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::StorageError;
pub use identity::Identity;
pub use interception::{cache_interceptor, CacheLayer, CachePolicy, PolicyRegistry};
pub use invalidation::{CacheEvent, InvalidationCoordinator, InvalidationReport};
pub use storage::{StorageConfig, StorageEngine, StorageOperationResult, StorageValue};
pub use tasks::spawn_cleanup_task;
