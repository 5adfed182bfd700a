//! Response DTOs for the cache management API
//!
//! Most endpoints return the engine's `StorageOperationResult` envelope
//! directly; the types here cover the remaining shapes.

use serde::Serialize;

/// Response body for key inspection (GET /admin/cache/keys/:key)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInfoResponse {
    pub key: String,
    pub exists: bool,
    /// Remaining seconds, `-1` when absent, `-2` without expiry
    pub ttl: i64,
}

impl KeyInfoResponse {
    pub fn new(key: impl Into<String>, exists: bool, ttl: i64) -> Self {
        Self {
            key: key.into(),
            exists,
            ttl,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Active storage backend
    pub backend: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(backend: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            backend: backend.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_info_serialize() {
        let resp = KeyInfoResponse::new("leaderboard:weekly", true, 42);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["key"], "leaderboard:weekly");
        assert_eq!(json["exists"], true);
        assert_eq!(json["ttl"], 42);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy("memory");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("memory"));
        assert!(json.contains("timestamp"));
    }
}
