//! Remote Backend Module
//!
//! Redis-backed storage shared by every process instance.
//!
//! Features:
//! - Native per-key TTL via SETEX
//! - Atomic counters via INCRBY
//! - Cursor-based SCAN for listing and pattern deletes (never KEYS)
//! - Pipelined batch writes and deletes

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::debug;

use crate::error::Result;
use crate::storage::backend::{BackendKind, StorageBackend, TTL_MISSING, TTL_PERSISTENT};
use crate::storage::{CacheEntry, StorageStats, StorageValue};

/// Page size hint passed to SCAN.
const SCAN_BATCH: usize = 500;

/// Assumed bytes per key when estimating size. Redis does not report
/// per-key sizes cheaply, so remote stats are an approximation.
pub const REMOTE_ITEM_SIZE_ESTIMATE: u64 = 1024;

// == Redis Backend ==
/// Redis-backed storage backend.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Opens a managed connection to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }

    /// Accumulates keys matching `pattern` across SCAN pages until the
    /// cursor returns to zero.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may report a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

/// Maps a PTTL reply onto the engine's TTL convention, rounding up to seconds.
fn normalize_pttl(pttl_ms: i64) -> i64 {
    match pttl_ms {
        -2 => TTL_MISSING,
        -1 => TTL_PERSISTENT,
        ms => (ms.max(0) as u64).div_ceil(1000) as i64,
    }
}

fn decode(raw: Option<String>) -> Result<Option<StorageValue>> {
    raw.map(|raw| StorageValue::decode(&raw)).transpose()
}

#[async_trait]
impl StorageBackend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn get(&self, key: &str) -> Result<Option<StorageValue>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        decode(raw)
    }

    async fn set(&self, key: &str, value: StorageValue, ttl: Option<u64>) -> Result<()> {
        let mut conn = self.conn.clone();
        let raw = value.encode()?;

        match ttl {
            Some(ttl) if ttl > 0 => conn.set_ex::<_, _, ()>(key, raw, ttl).await?,
            _ => conn.set::<_, _, ()>(key, raw).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn set_ttl(&self, key: &str, ttl: u64) -> Result<bool> {
        let mut conn = self.conn.clone();

        if ttl > 0 {
            return Ok(conn.expire(key, ttl as i64).await?);
        }

        // PERSIST reports 0 for keys without expiry, so check existence apart
        let found: bool = conn.exists(key).await?;
        if found {
            let _: bool = conn.persist(key).await?;
        }
        Ok(found)
    }

    async fn get_ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let pttl: i64 = conn.pttl(key).await?;
        Ok(normalize_pttl(pttl))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.scan(pattern).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<StorageValue>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key);
        }
        let raws: Vec<Option<String>> = cmd.query_async(&mut conn).await?;

        raws.into_iter().map(decode).collect()
    }

    async fn mset(&self, entries: Vec<CacheEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for entry in &entries {
            let raw = entry.value.encode()?;
            match entry.ttl_seconds {
                Some(ttl) if ttl > 0 => pipe.set_ex(&entry.key, raw, ttl).ignore(),
                _ => pipe.set(&entry.key, raw).ignore(),
            };
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, by).await?)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let keys = self.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.del(key);
        }

        let mut conn = self.conn.clone();
        let removed: Vec<i64> = pipe.query_async(&mut conn).await?;
        let removed = removed.into_iter().sum::<i64>() as usize;

        debug!(pattern, matched = keys.len(), removed, "Remote pattern invalidation");
        Ok(removed)
    }

    async fn stats(&self, pattern: &str) -> Result<StorageStats> {
        let count = self.scan(pattern).await?.len();

        // Hits and misses are not observable here; they stay zero
        Ok(StorageStats::from_tallies(
            count,
            count as u64 * REMOTE_ITEM_SIZE_ESTIMATE,
            0,
        ))
    }
}
