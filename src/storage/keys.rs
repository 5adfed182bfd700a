//! Key Codec
//!
//! Deterministic construction of namespaced cache keys.
//!
//! Request keys without an explicit name are reduced to a 32-bit rolling hash.
//! Distinct requests can collide in that space, in which case one request may
//! be served another's cached payload. Routes caching per-user or otherwise
//! sensitive data should declare an explicit key, which is never hashed.

use std::collections::BTreeMap;

/// Namespace shared by every key derived from an HTTP request.
pub const REQUEST_KEY_NAMESPACE: &str = "cache:";

/// Identity suffix used when a request carries no authenticated subject.
pub const ANONYMOUS: &str = "anonymous";

/// Prepends the configured prefix to a logical key.
pub fn build_key(prefix: &str, logical_key: &str) -> String {
    format!("{prefix}{logical_key}")
}

// == Request Fingerprint ==
/// The normalized parts of a request that determine its cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFingerprint {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    /// Authenticated subject id
    pub identity: Option<String>,
}

impl RequestFingerprint {
    pub fn identity_suffix(&self) -> &str {
        self.identity.as_deref().unwrap_or(ANONYMOUS)
    }

    /// `method|path|query|params|identity`, with the method lowercased and
    /// query/params serialized as JSON objects.
    pub fn canonical(&self) -> String {
        [
            self.method.to_lowercase(),
            self.path.clone(),
            serde_json::to_string(&self.query).unwrap_or_default(),
            serde_json::to_string(&self.params).unwrap_or_default(),
            self.identity_suffix().to_string(),
        ]
        .join("|")
    }
}

/// Builds the cache key for an intercepted request.
///
/// Explicit keys are scoped to the caller: `cache:<explicit>:<identity>`.
/// Otherwise the key is `cache:<abs(hash(canonical))>`.
pub fn build_request_key(fingerprint: &RequestFingerprint, explicit_key: Option<&str>) -> String {
    match explicit_key {
        Some(explicit) => format!(
            "{REQUEST_KEY_NAMESPACE}{explicit}:{}",
            fingerprint.identity_suffix()
        ),
        None => hashed_key(&fingerprint.canonical()),
    }
}

fn hashed_key(canonical: &str) -> String {
    format!(
        "{REQUEST_KEY_NAMESPACE}{}",
        rolling_hash(canonical).unsigned_abs()
    )
}

/// `hash = hash * 31 + unit` over UTF-16 code units, wrapping at 32 bits.
pub fn rolling_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
