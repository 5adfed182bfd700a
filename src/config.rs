//! Configuration Module
//!
//! Handles loading process configuration from environment variables and
//! deriving the immutable storage configuration handed to the engine.

use std::env;

use crate::storage::{CleanupOptions, StorageConfig};

/// Process configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix prepended to every cache key
    pub prefix: String,
    /// Default TTL in seconds for writes without explicit TTL
    pub default_ttl: u64,
    /// Size ceiling in bytes used by utilization and cleanup
    pub max_size_bytes: u64,
    /// Track hit/miss counters in the memory backend
    pub enable_metrics: bool,
    /// Remote store URL; the memory backend is used when absent
    pub redis_url: Option<String>,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Maximum entry age in seconds enforced by cleanup
    pub cleanup_max_age: Option<u64>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_PREFIX` - Key prefix (default: `trivia:`)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `MAX_SIZE_BYTES` - Size ceiling in bytes (default: 64 MiB)
    /// - `ENABLE_METRICS` - Hit/miss tracking (default: true)
    /// - `REDIS_URL` - Remote store URL (default: unset)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `CLEANUP_MAX_AGE` - Maximum entry age in seconds (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.prefix),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            max_size_bytes: parse_var("MAX_SIZE_BYTES").unwrap_or(defaults.max_size_bytes),
            enable_metrics: parse_var("ENABLE_METRICS").unwrap_or(defaults.enable_metrics),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            cleanup_max_age: parse_var("CLEANUP_MAX_AGE"),
        }
    }

    /// Storage configuration handed to the engine at construction.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig {
            prefix: self.prefix.clone(),
            default_ttl_seconds: self.default_ttl,
            max_size_bytes: self.max_size_bytes,
            enable_metrics: self.enable_metrics,
        }
    }

    /// Options used by the periodic maintenance pass.
    pub fn cleanup_options(&self) -> CleanupOptions {
        CleanupOptions {
            max_age_seconds: self.cleanup_max_age,
            max_size_bytes: Some(self.max_size_bytes),
            dry_run: false,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "trivia:".to_string(),
            default_ttl: 300,
            max_size_bytes: 64 * 1024 * 1024,
            enable_metrics: true,
            redis_url: None,
            server_port: 3000,
            cleanup_interval: 60,
            cleanup_max_age: None,
        }
    }
}
