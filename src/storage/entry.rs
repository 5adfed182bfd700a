//! Cache Entry Module
//!
//! Defines the batch-write unit and the memory backend's per-key record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::storage::StorageValue;

// == Cache Entry ==
/// A key/value pair written by batch operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: StorageValue,
    /// TTL in seconds; the engine default applies when absent
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<StorageValue>, ttl_seconds: Option<u64>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl_seconds,
        }
    }
}

// == Memory Entry ==
/// Represents a single entry held by the memory backend.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// The stored value
    pub value: StorageValue,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Cached size estimate of the value in bytes
    pub size: usize,
}

impl MemoryEntry {
    // == Constructor ==
    /// Creates a new entry with optional TTL.
    ///
    /// A TTL of zero means no expiration, same as `None`.
    pub fn new(value: StorageValue, ttl_seconds: Option<u64>) -> Self {
        let now = current_timestamp_ms();
        let size = value.size_estimate();

        Self {
            value,
            created_at: now,
            expires_at: expiry_from_ttl(now, ttl_seconds),
            size,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is strictly past its
    /// expiration timestamp.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()))
    }

    /// Returns remaining TTL in whole seconds rounded up, or None if no
    /// expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.ttl_remaining_ms().map(|ms| ms.div_ceil(1000))
    }

    /// Replaces the expiration, keeping the value.
    pub fn set_ttl(&mut self, ttl_seconds: u64) {
        self.expires_at = expiry_from_ttl(current_timestamp_ms(), Some(ttl_seconds));
    }

    /// Age of the entry in seconds.
    pub fn age_seconds(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at) / 1000
    }
}

fn expiry_from_ttl(now: u64, ttl_seconds: Option<u64>) -> Option<u64> {
    match ttl_seconds {
        Some(ttl) if ttl > 0 => Some(now + ttl * 1000),
        _ => None,
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
