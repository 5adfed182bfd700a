//! Memory Backend Module
//!
//! In-process map from prefixed key to `{value, expiry}` with lazy expiry.
//!
//! The map belongs to a single process. It sits behind a lock so concurrent
//! tasks cannot corrupt it, but nothing is shared with other instances: a
//! multi-instance deployment must use the remote backend.

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;

use crate::error::{Result, StorageError};
use crate::storage::backend::{BackendKind, StorageBackend, TTL_MISSING, TTL_PERSISTENT};
use crate::storage::entry::current_timestamp_ms;
use crate::storage::{
    CacheEntry, CleanupOptions, CleanupReport, HitCounters, MemoryEntry, StorageStats,
    StorageValue,
};

// == Memory Store ==
/// Synchronous storage core of the memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, MemoryEntry>,
    /// Hit/miss counters
    counters: HitCounters,
    /// Whether `get` updates the counters
    track_hits: bool,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new(track_hits: bool) -> Self {
        Self {
            entries: HashMap::new(),
            counters: HitCounters::default(),
            track_hits,
        }
    }

    /// Returns the entry for `key`, dropping it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&mut MemoryEntry> {
        if self.entries.get(key)?.is_expired() {
            self.entries.remove(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    // == Set ==
    /// Stores a value, replacing any previous value and expiry.
    pub fn set(&mut self, key: String, value: StorageValue, ttl: Option<u64>) {
        self.entries.insert(key, MemoryEntry::new(value, ttl));
    }

    // == Get ==
    /// Retrieves a value by key. Expired entries are removed and count as misses.
    pub fn get(&mut self, key: &str) -> Option<StorageValue> {
        let value = self.live_entry(key).map(|entry| entry.value.clone());

        if self.track_hits {
            match value {
                Some(_) => self.counters.record_hit(),
                None => self.counters.record_miss(),
            }
        }

        value
    }

    // == Delete ==
    /// Removes the key. An expired entry still awaiting the sweep is dropped
    /// too, but does not count as deleted.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Exists ==
    pub fn exists(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    // == TTL ==
    pub fn set_ttl(&mut self, key: &str, ttl: u64) -> bool {
        match self.live_entry(key) {
            Some(entry) => {
                entry.set_ttl(ttl);
                true
            }
            None => false,
        }
    }

    pub fn get_ttl(&mut self, key: &str) -> i64 {
        match self.live_entry(key) {
            Some(entry) => entry
                .ttl_remaining()
                .map(|secs| secs as i64)
                .unwrap_or(TTL_PERSISTENT),
            None => TTL_MISSING,
        }
    }

    // == Keys ==
    /// Returns live keys matching `pattern`, sorted.
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let regex = glob_to_regex(pattern)?;
        let now = current_timestamp_ms();

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, entry)| !entry.is_expired_at(now) && regex.is_match(key))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    // == Increment ==
    /// Adds `by` to an integer entry. Missing keys start at zero with no expiry.
    pub fn increment(&mut self, key: &str, by: i64) -> Result<i64> {
        if let Some(entry) = self.live_entry(key) {
            let current = entry
                .value
                .as_i64()
                .ok_or_else(|| StorageError::NotAnInteger(key.to_string()))?;
            let next = current
                .checked_add(by)
                .ok_or_else(|| StorageError::Overflow(key.to_string()))?;

            entry.value = StorageValue::from(next);
            entry.size = entry.value.size_estimate();
            return Ok(next);
        }

        self.set(key.to_string(), StorageValue::from(by), None);
        Ok(by)
    }

    // == Invalidate Pattern ==
    /// Deletes every key matching `pattern`; returns how many live keys went.
    pub fn invalidate_pattern(&mut self, pattern: &str) -> Result<usize> {
        let regex = glob_to_regex(pattern)?;
        let now = current_timestamp_ms();
        let mut removed = 0;

        self.entries.retain(|key, entry| {
            if !regex.is_match(key) {
                return true;
            }
            if !entry.is_expired_at(now) {
                removed += 1;
            }
            false
        });

        Ok(removed)
    }

    // == Stats ==
    /// Walks all entries once, evicting expired ones, and tallies the live
    /// entries matching `pattern`.
    pub fn stats(&mut self, pattern: &str) -> Result<StorageStats> {
        let regex = glob_to_regex(pattern)?;
        let now = current_timestamp_ms();
        let (mut items, mut size, mut expired) = (0usize, 0u64, 0usize);

        self.entries.retain(|key, entry| {
            if entry.is_expired_at(now) {
                expired += 1;
                return false;
            }
            if regex.is_match(key) {
                items += 1;
                size += entry.size as u64;
            }
            true
        });

        Ok(StorageStats::from_tallies(items, size, expired).with_counters(&self.counters))
    }

    // == Cleanup ==
    /// Removes expired entries, entries older than the max age, then the
    /// oldest entries until the total size fits under the ceiling.
    pub fn cleanup(&mut self, options: &CleanupOptions) -> CleanupReport {
        let now = current_timestamp_ms();
        let mut report = CleanupReport {
            scanned: self.entries.len(),
            dry_run: options.dry_run,
            ..CleanupReport::default()
        };
        let mut doomed: Vec<String> = Vec::new();
        let mut survivors: Vec<(u64, String, usize)> = Vec::new();

        for (key, entry) in &self.entries {
            if entry.is_expired_at(now) {
                report.expired += 1;
                report.bytes_freed += entry.size as u64;
                doomed.push(key.clone());
            } else if options
                .max_age_seconds
                .is_some_and(|max_age| entry.age_seconds(now) > max_age)
            {
                report.aged_out += 1;
                report.bytes_freed += entry.size as u64;
                doomed.push(key.clone());
            } else {
                survivors.push((entry.created_at, key.clone(), entry.size));
            }
        }

        if let Some(ceiling) = options.max_size_bytes {
            let mut total: u64 = survivors.iter().map(|(_, _, size)| *size as u64).sum();
            // Oldest first
            survivors.sort();
            for (_, key, size) in survivors {
                if total <= ceiling {
                    break;
                }
                total -= size as u64;
                report.evicted_for_size += 1;
                report.bytes_freed += size as u64;
                doomed.push(key);
            }
        }

        if !options.dry_run {
            for key in &doomed {
                self.entries.remove(key);
            }
        }

        report
    }

    // == Length ==
    /// Returns the number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compiles a glob with `*` as the only wildcard into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Ok(Regex::new(&format!("^{body}$"))?)
}

// == Memory Backend ==
/// Async adapter placing a `MemoryStore` behind a lock.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    store: RwLock<MemoryStore>,
}

impl MemoryBackend {
    pub fn new(track_hits: bool) -> Self {
        Self {
            store: RwLock::new(MemoryStore::new(track_hits)),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<StorageValue>> {
        // Write lock: lazy expiry and hit counters mutate the store
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: StorageValue, ttl: Option<u64>) -> Result<()> {
        self.store.write().await.set(key.to_string(), value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.delete(key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.exists(key))
    }

    async fn set_ttl(&self, key: &str, ttl: u64) -> Result<bool> {
        Ok(self.store.write().await.set_ttl(key, ttl))
    }

    async fn get_ttl(&self, key: &str) -> Result<i64> {
        Ok(self.store.write().await.get_ttl(key))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.store.read().await.keys(pattern)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<StorageValue>>> {
        let mut store = self.store.write().await;
        Ok(keys.iter().map(|key| store.get(key)).collect())
    }

    async fn mset(&self, entries: Vec<CacheEntry>) -> Result<()> {
        let mut store = self.store.write().await;
        for entry in entries {
            store.set(entry.key, entry.value, entry.ttl_seconds);
        }
        Ok(())
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64> {
        self.store.write().await.increment(key, by)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        self.store.write().await.invalidate_pattern(pattern)
    }

    async fn stats(&self, pattern: &str) -> Result<StorageStats> {
        self.store.write().await.stats(pattern)
    }

    async fn cleanup(&self, options: &CleanupOptions) -> Result<CleanupReport> {
        let mut store = self.store.write().await;
        Ok(store.cleanup(options))
    }
}
