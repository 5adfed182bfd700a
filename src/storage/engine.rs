//! Storage Engine Module
//!
//! Unified façade over exactly one backend, plus the cache-aside coordinator.
//!
//! Every key is prefixed before reaching the backend; callers never see the
//! prefix. Every operation returns a `StorageOperationResult` instead of an
//! error, so a cache outage degrades to recomputation rather than failure.

use std::future::Future;
use std::time::Instant;

use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::storage::backend::{BackendKind, StorageBackend};
use crate::storage::keys::build_key;
use crate::storage::{
    CacheEntry, CleanupOptions, CleanupReport, MemoryBackend, RedisBackend,
    StorageOperationResult, StorageStats, StorageValue,
};

/// Predicate deciding whether a cached value is still acceptable to a reader.
pub type Validator<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

// == Storage Config ==
/// Process-wide storage configuration, fixed at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub prefix: String,
    /// Applied to writes that pass no TTL
    pub default_ttl_seconds: u64,
    /// Ceiling used for utilization reporting
    pub max_size_bytes: u64,
    /// Track hit/miss counters and log per-operation timings
    pub enable_metrics: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            prefix: "trivia:".to_string(),
            default_ttl_seconds: 300,
            max_size_bytes: 64 * 1024 * 1024,
            enable_metrics: true,
        }
    }
}

// == Storage Engine ==
pub struct StorageEngine {
    backend: Box<dyn StorageBackend>,
    config: StorageConfig,
}

impl StorageEngine {
    // == Constructors ==
    /// Builds an engine on the remote backend when a connection is supplied,
    /// on the memory backend otherwise.
    pub fn new(config: StorageConfig, remote: Option<ConnectionManager>) -> Self {
        let backend: Box<dyn StorageBackend> = match remote {
            Some(conn) => Box::new(RedisBackend::new(conn)),
            None => Box::new(MemoryBackend::new(config.enable_metrics)),
        };
        Self::with_backend(config, backend)
    }

    /// Builds an engine on the memory backend.
    pub fn memory(config: StorageConfig) -> Self {
        Self::new(config, None)
    }

    pub fn with_backend(config: StorageConfig, backend: Box<dyn StorageBackend>) -> Self {
        info!(
            backend = backend.kind().as_str(),
            prefix = %config.prefix,
            default_ttl = config.default_ttl_seconds,
            "Storage engine initialized"
        );
        Self { backend, config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    // == Helpers ==
    fn key(&self, key: &str) -> String {
        build_key(&self.config.prefix, key)
    }

    fn strip<'k>(&self, key: &'k str) -> &'k str {
        key.strip_prefix(self.config.prefix.as_str()).unwrap_or(key)
    }

    fn resolve_ttl(&self, ttl: Option<u64>) -> Option<u64> {
        Some(ttl.unwrap_or(self.config.default_ttl_seconds))
    }

    /// Wraps a backend outcome into the result envelope, logging failures.
    fn finish<T>(
        &self,
        op: &'static str,
        target: &str,
        result: Result<Option<T>>,
        started: Instant,
    ) -> StorageOperationResult<T> {
        if let Err(e) = &result {
            warn!(op, key = %target, error = %e, "Storage operation failed");
        }

        let envelope = match result {
            Ok(data) => StorageOperationResult::ok(data, started),
            Err(e) => StorageOperationResult::fail(e.to_string(), started),
        };

        if self.config.enable_metrics {
            debug!(
                op,
                key = %target,
                success = envelope.success,
                duration_ms = envelope.duration_ms,
                "Storage operation"
            );
        }
        envelope
    }

    async fn purge_invalid(&self, full_key: &str) {
        debug!(key = %full_key, "Cached value rejected by validator, purging");
        if let Err(e) = self.backend.delete(full_key).await {
            warn!(key = %full_key, error = %e, "Failed to purge invalid entry");
        }
    }

    // == Get ==
    /// Reads a value. A miss is a successful result without data.
    ///
    /// When a validator rejects the stored value, the entry is deleted and
    /// the result fails with "validation failed".
    pub async fn get(
        &self,
        key: &str,
        validator: Option<Validator<'_, StorageValue>>,
    ) -> StorageOperationResult<StorageValue> {
        let started = Instant::now();
        let full = self.key(key);

        let result = match self.backend.get(&full).await {
            Ok(Some(value)) if validator.is_some_and(|check| !check(&value)) => {
                self.purge_invalid(&full).await;
                Err(StorageError::ValidationFailed)
            }
            other => other,
        };

        self.finish("get", key, result, started)
    }

    /// Reads a value into `T`. A stored value that no longer deserializes
    /// into `T` is treated like a validator rejection.
    pub async fn get_as<T>(
        &self,
        key: &str,
        validator: Option<Validator<'_, T>>,
    ) -> StorageOperationResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let started = Instant::now();
        let full = self.key(key);

        let result = match self.backend.get(&full).await {
            Ok(Some(raw)) => {
                let typed = raw
                    .to_typed::<T>()
                    .ok()
                    .filter(|value| validator.map_or(true, |check| check(value)));
                match typed {
                    Some(value) => Ok(Some(value)),
                    None => {
                        self.purge_invalid(&full).await;
                        Err(StorageError::ValidationFailed)
                    }
                }
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        self.finish("get", key, result, started)
    }

    // == Set ==
    /// Writes a value. `None` applies the default TTL, `Some(0)` disables expiry.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<StorageValue>,
        ttl: Option<u64>,
    ) -> StorageOperationResult<()> {
        let started = Instant::now();
        let value = value.into();
        let result = self
            .backend
            .set(&self.key(key), value, self.resolve_ttl(ttl))
            .await;

        self.finish("set", key, result.map(Some), started)
    }

    /// Writes any serializable value, rejecting shapes that have no
    /// StorageValue form.
    pub async fn set_typed<T>(&self, key: &str, value: &T, ttl: Option<u64>) -> StorageOperationResult<()>
    where
        T: Serialize + ?Sized,
    {
        match StorageValue::from_serialize(value) {
            Ok(value) => self.set(key, value, ttl).await,
            Err(e) => self.finish("set", key, Err(e), Instant::now()),
        }
    }

    // == Cache-Aside ==
    /// Returns the cached value for `key`, or runs `factory`, caches its
    /// output and returns it.
    ///
    /// Factory errors propagate to the caller; cache failures only log.
    /// Concurrent misses on the same key each run the factory.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<u64>,
        validator: Option<Validator<'_, T>>,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get_as::<T>(key, validator).await.into_data() {
            debug!(key, "Cache hit");
            return Ok(value);
        }

        debug!(key, "Cache miss, computing value");
        let value = factory().await?;
        self.set_typed(key, &value, ttl).await;
        Ok(value)
    }

    // == Delete ==
    /// Removes a key. Fails (without error) when the key does not exist.
    pub async fn delete(&self, key: &str) -> StorageOperationResult<bool> {
        let started = Instant::now();
        let result = self.backend.delete(&self.key(key)).await;
        let mut envelope = self.finish("delete", key, result.map(Some), started);

        if envelope.data == Some(false) {
            envelope.success = false;
            envelope.error = Some("key not found".to_string());
        }
        envelope
    }

    // == Exists / TTL ==
    pub async fn exists(&self, key: &str) -> StorageOperationResult<bool> {
        let started = Instant::now();
        let result = self.backend.exists(&self.key(key)).await;
        self.finish("exists", key, result.map(Some), started)
    }

    /// Replaces the expiry of an existing key; data is false when absent.
    pub async fn set_ttl(&self, key: &str, ttl: u64) -> StorageOperationResult<bool> {
        let started = Instant::now();
        let result = self.backend.set_ttl(&self.key(key), ttl).await;
        self.finish("set_ttl", key, result.map(Some), started)
    }

    /// Remaining seconds, `-1` when absent, `-2` when the key never expires.
    pub async fn get_ttl(&self, key: &str) -> StorageOperationResult<i64> {
        let started = Instant::now();
        let result = self.backend.get_ttl(&self.key(key)).await;
        self.finish("get_ttl", key, result.map(Some), started)
    }

    // == Batch ==
    pub async fn mget(&self, keys: &[&str]) -> StorageOperationResult<Vec<Option<StorageValue>>> {
        let started = Instant::now();
        let full: Vec<String> = keys.iter().map(|key| self.key(key)).collect();
        let result = self.backend.mget(&full).await;
        self.finish("mget", &keys.join(","), result.map(Some), started)
    }

    pub async fn mset(&self, entries: Vec<CacheEntry>) -> StorageOperationResult<()> {
        let started = Instant::now();
        let target = format!("{} entries", entries.len());
        let entries = entries
            .into_iter()
            .map(|entry| CacheEntry {
                key: self.key(&entry.key),
                ttl_seconds: self.resolve_ttl(entry.ttl_seconds),
                value: entry.value,
            })
            .collect();

        let result = self.backend.mset(entries).await;
        self.finish("mset", &target, result.map(Some), started)
    }

    /// Adds `by` to an integer value and returns the new value.
    pub async fn increment(&self, key: &str, by: i64) -> StorageOperationResult<i64> {
        let started = Instant::now();
        let result = self.backend.increment(&self.key(key), by).await;
        self.finish("increment", key, result.map(Some), started)
    }

    // == Listing ==
    /// Keys matching a glob pattern, without the prefix.
    pub async fn keys(&self, pattern: &str) -> StorageOperationResult<Vec<String>> {
        let started = Instant::now();
        let result = self.backend.keys(&self.key(pattern)).await.map(|keys| {
            Some(keys.iter().map(|key| self.strip(key).to_string()).collect())
        });
        self.finish("keys", pattern, result, started)
    }

    pub async fn get_keys(&self) -> StorageOperationResult<Vec<String>> {
        self.keys("*").await
    }

    pub async fn stats(&self) -> StorageOperationResult<StorageStats> {
        let started = Instant::now();
        let max_size = self.config.max_size_bytes;
        let result = self
            .backend
            .stats(&self.key("*"))
            .await
            .map(|stats| Some(stats.with_capacity(max_size)));
        self.finish("stats", "*", result, started)
    }

    // == Invalidation ==
    /// Deletes every key matching a glob pattern, returning the count.
    pub async fn invalidate_pattern(&self, pattern: &str) -> StorageOperationResult<usize> {
        let started = Instant::now();
        let result = self.backend.invalidate_pattern(&self.key(pattern)).await;
        self.finish("invalidate_pattern", pattern, result.map(Some), started)
    }

    /// Same as `invalidate_pattern`, without the count.
    pub async fn invalidate(&self, pattern: &str) -> StorageOperationResult<()> {
        let counted = self.invalidate_pattern(pattern).await;
        StorageOperationResult {
            success: counted.success,
            data: counted.success.then_some(()),
            error: counted.error,
            duration_ms: counted.duration_ms,
            storage_type: counted.storage_type,
        }
    }

    /// Removes every key under the prefix.
    pub async fn clear(&self) -> StorageOperationResult<usize> {
        let cleared = self.invalidate_pattern("*").await;
        if let Some(count) = cleared.data {
            info!(count, "Cache cleared");
        }
        cleared
    }

    // == Maintenance ==
    /// Runs a maintenance pass. Only the memory backend supports it.
    pub async fn cleanup(&self, options: &CleanupOptions) -> StorageOperationResult<CleanupReport> {
        let started = Instant::now();
        let result = self.backend.cleanup(options).await;
        self.finish("cleanup", "*", result.map(Some), started)
    }

    /// Releases process-local state. The memory map is emptied; remote data
    /// is left to expire on its own.
    pub async fn shutdown(&self) {
        if self.backend_kind() == BackendKind::Memory {
            self.clear().await;
        }
        info!("Storage engine shut down");
    }
}
