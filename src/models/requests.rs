//! Request DTOs for the cache management API
//!
//! Defines the structure of incoming query strings and request bodies.

use serde::Deserialize;

/// Longest glob pattern the management API accepts.
pub const MAX_PATTERN_LEN: usize = 256;

/// Query string for key listing (GET /admin/cache/keys)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeysQuery {
    /// Glob pattern, `*` when omitted
    #[serde(default)]
    pub pattern: Option<String>,
}

impl KeysQuery {
    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().filter(|p| !p.is_empty()).unwrap_or("*")
    }
}

/// Request body for pattern invalidation (POST /admin/cache/invalidate)
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > MAX_PATTERN_LEN {
            return Some(format!(
                "Pattern exceeds maximum length of {MAX_PATTERN_LEN} characters"
            ));
        }
        None
    }
}
