//! Route caching policies
//!
//! Policies are declared once at router construction and looked up per
//! request by method and route template.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use tracing::warn;

use crate::identity::Identity;
use crate::storage::keys::RequestFingerprint;

/// Predicate deciding whether a handler's response may be cached.
pub type CacheCondition = Arc<dyn Fn(&RequestSnapshot, &ResponseSnapshot) -> bool + Send + Sync>;

// == Snapshots ==
/// The parts of an inbound request visible to cache conditions.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub path: String,
    /// Route template the request matched, e.g. `/users/:id`
    pub route: String,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub identity: Option<Identity>,
}

impl RequestSnapshot {
    pub fn fingerprint(&self) -> RequestFingerprint {
        RequestFingerprint {
            method: self.method.as_str().to_string(),
            path: self.path.clone(),
            query: self.query.clone(),
            params: self.params.clone(),
            identity: self.identity.as_ref().map(|identity| identity.subject.clone()),
        }
    }
}

/// A successful handler response with a JSON body.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

// == Cache Policy ==
#[derive(Clone)]
pub struct CachePolicy {
    pub ttl_seconds: u64,
    /// Named key, scoped per caller, replacing the hashed request key
    pub explicit_key: Option<String>,
    pub tags: Vec<String>,
    pub disabled: bool,
    pub condition: Option<CacheCondition>,
}

impl CachePolicy {
    pub fn ttl(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            explicit_key: None,
            tags: Vec::new(),
            disabled: false,
            condition: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.explicit_key = Some(key.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn when<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RequestSnapshot, &ResponseSnapshot) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Evaluates the condition. A panicking condition skips caching.
    pub fn allows(&self, request: &RequestSnapshot, response: &ResponseSnapshot) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };

        match catch_unwind(AssertUnwindSafe(|| condition(request, response))) {
            Ok(allowed) => allowed,
            Err(_) => {
                warn!(route = %request.route, "Cache condition panicked, skipping cache write");
                false
            }
        }
    }
}

impl fmt::Debug for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("explicit_key", &self.explicit_key)
            .field("tags", &self.tags)
            .field("disabled", &self.disabled)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

// == Policy Registry ==
/// Route table of caching policies.
///
/// A policy registered for a route wins over the registry default; with
/// neither, requests pass through uncached. The default only covers safe
/// reads (GET and HEAD), so writes are never served from cache unless a
/// route opts in explicitly.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    routes: HashMap<(Method, String), CachePolicy>,
    default: Option<CachePolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, method: Method, route: impl Into<String>, policy: CachePolicy) -> Self {
        self.routes.insert((method, route.into()), policy);
        self
    }

    pub fn with_default(mut self, policy: CachePolicy) -> Self {
        self.default = Some(policy);
        self
    }

    pub fn resolve(&self, method: &Method, route: &str) -> Option<&CachePolicy> {
        if let Some(policy) = self.routes.get(&(method.clone(), route.to_string())) {
            return Some(policy);
        }
        if method == Method::GET || method == Method::HEAD {
            self.default.as_ref()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
