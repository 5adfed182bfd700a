//! Backend Trait
//!
//! The operation surface every storage backend implements. Keys arriving here
//! are already prefixed by the engine.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Result, StorageError};
use crate::storage::{CacheEntry, CleanupOptions, CleanupReport, StorageStats, StorageValue};

/// TTL reported for a key that does not exist.
pub const TTL_MISSING: i64 = -1;

/// TTL reported for a key that never expires.
pub const TTL_PERSISTENT: i64 = -2;

/// Which backend an engine was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Remote => "remote",
        }
    }
}

// == Storage Backend ==
/// A key-value store with per-key TTL.
///
/// TTL arguments: `None` and `Some(0)` both mean "no expiry".
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn get(&self, key: &str) -> Result<Option<StorageValue>>;

    /// Overwrites unconditionally, replacing value and expiry.
    async fn set(&self, key: &str, value: StorageValue, ttl: Option<u64>) -> Result<()>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Returns false when the key does not exist.
    async fn set_ttl(&self, key: &str, ttl: u64) -> Result<bool>;

    /// Remaining seconds rounded up, `TTL_MISSING` or `TTL_PERSISTENT`.
    async fn get_ttl(&self, key: &str) -> Result<i64>;

    /// Keys matching a glob pattern (`*` wildcard).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<StorageValue>>>;

    async fn mset(&self, entries: Vec<CacheEntry>) -> Result<()>;

    /// Adds `by` to an integer value (missing keys start at zero) and returns
    /// the new value. Existing expiry is kept.
    async fn increment(&self, key: &str, by: i64) -> Result<i64>;

    /// Deletes every key matching a glob pattern and returns the count.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize>;

    /// Stats over the keys matching `pattern`.
    async fn stats(&self, pattern: &str) -> Result<StorageStats>;

    async fn cleanup(&self, _options: &CleanupOptions) -> Result<CleanupReport> {
        Err(StorageError::Unsupported(self.kind().as_str()))
    }
}
