//! Test backend that fails on demand.

use async_trait::async_trait;
use redis::{ErrorKind, RedisError};

use crate::error::{Result, StorageError};
use crate::storage::backend::{BackendKind, StorageBackend};
use crate::storage::{CacheEntry, MemoryBackend, StorageStats, StorageValue};

/// Memory backend that reports an I/O error for any key or pattern
/// containing `poison`. Reports itself as remote, so cleanup is unsupported.
pub struct FlakyBackend {
    inner: MemoryBackend,
    poison: String,
}

impl FlakyBackend {
    pub fn new(poison: &str) -> Self {
        Self {
            inner: MemoryBackend::new(true),
            poison: poison.to_string(),
        }
    }

    fn check(&self, key: &str) -> Result<()> {
        if key.contains(&self.poison) {
            return Err(StorageError::Redis(RedisError::from((
                ErrorKind::IoError,
                "connection reset",
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn get(&self, key: &str) -> Result<Option<StorageValue>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: StorageValue, ttl: Option<u64>) -> Result<()> {
        self.check(key)?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check(key)?;
        self.inner.exists(key).await
    }

    async fn set_ttl(&self, key: &str, ttl: u64) -> Result<bool> {
        self.check(key)?;
        self.inner.set_ttl(key, ttl).await
    }

    async fn get_ttl(&self, key: &str) -> Result<i64> {
        self.check(key)?;
        self.inner.get_ttl(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.check(pattern)?;
        self.inner.keys(pattern).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<StorageValue>>> {
        for key in keys {
            self.check(key)?;
        }
        self.inner.mget(keys).await
    }

    async fn mset(&self, entries: Vec<CacheEntry>) -> Result<()> {
        for entry in &entries {
            self.check(&entry.key)?;
        }
        self.inner.mset(entries).await
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64> {
        self.check(key)?;
        self.inner.increment(key, by).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        self.check(pattern)?;
        self.inner.invalidate_pattern(pattern).await
    }

    async fn stats(&self, pattern: &str) -> Result<StorageStats> {
        self.inner.stats(pattern).await
    }
}
