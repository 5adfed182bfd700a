//! Storage Module
//!
//! Caching engine with interchangeable memory and Redis backends, TTL
//! expiry, pattern invalidation and a cache-aside coordinator.

mod backend;
mod engine;
mod entry;
pub mod keys;
mod memory;
mod remote;
mod result;
mod stats;
mod value;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public types
pub use backend::{BackendKind, StorageBackend, TTL_MISSING, TTL_PERSISTENT};
pub use engine::{StorageConfig, StorageEngine, Validator};
pub use entry::{current_timestamp_ms, CacheEntry, MemoryEntry};
pub use memory::{MemoryBackend, MemoryStore};
pub use remote::{RedisBackend, REMOTE_ITEM_SIZE_ESTIMATE};
pub use result::{StorageOperationResult, StorageType};
pub use stats::{CleanupOptions, CleanupReport, HitCounters, StorageStats};
pub use value::StorageValue;
