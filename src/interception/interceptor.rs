//! Cache interceptor middleware
//!
//! Serves policy-covered requests from the cache and writes successful JSON
//! responses back on a miss. Cache failures never reach the client: a failed
//! read is a miss, a failed write is only logged.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{FromRequestParts, MatchedPath, Query, RawPathParams, Request, State},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::identity::Identity;
use crate::interception::policy::{CachePolicy, PolicyRegistry, RequestSnapshot, ResponseSnapshot};
use crate::invalidation::TagIndex;
use crate::storage::keys::build_request_key;
use crate::storage::StorageEngine;

/// Response header reporting whether the cache answered the request.
pub const X_CACHE: &str = "x-cache";

const HIT: &str = "HIT";
const MISS: &str = "MISS";

// == Cached Response ==
/// The stored form of an intercepted response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Value,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = (status, Json(self.body)).into_response();

        if let Some(content_type) = self
            .content_type
            .and_then(|value| HeaderValue::from_str(&value).ok())
        {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        response
    }
}

// == Cache Layer ==
/// State shared by every invocation of `cache_interceptor`.
#[derive(Clone)]
pub struct CacheLayer {
    engine: Arc<StorageEngine>,
    policies: Arc<PolicyRegistry>,
    tags: TagIndex,
}

impl CacheLayer {
    pub fn new(engine: Arc<StorageEngine>, policies: PolicyRegistry) -> Self {
        Self {
            tags: TagIndex::new(engine.clone()),
            policies: Arc::new(policies),
            engine,
        }
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    async fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let cached = self.engine.get_as::<CachedResponse>(key, None).await;
        if !cached.success {
            debug!(key, "Cache read failed, treating as miss");
        }
        cached.into_data()
    }

    async fn store(&self, key: &str, policy: &CachePolicy, response: CachedResponse) {
        let written = self
            .engine
            .set_typed(key, &response, Some(policy.ttl_seconds))
            .await;
        if !written.success {
            return;
        }

        for tag in &policy.tags {
            self.tags.record(tag, key, policy.ttl_seconds).await;
        }
    }
}

async fn snapshot(parts: &mut Parts, route: String) -> RequestSnapshot {
    let params = match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(_) => BTreeMap::new(),
    };
    let query = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    RequestSnapshot {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        route,
        query,
        params,
        headers: parts.headers.clone(),
        identity: parts.extensions.get::<Identity>().cloned(),
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Body length when the response is JSON of a known size within `limit`.
/// Streams and oversized bodies are left untouched.
fn bufferable_length(response: &Response, limit: usize) -> Option<usize> {
    if !is_json(response.headers()) {
        return None;
    }
    let length = usize::try_from(response.body().size_hint().exact()?).ok()?;
    (length <= limit).then_some(length)
}

fn mark(mut response: Response, state: &'static str) -> Response {
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(state));
    response
}

// == Middleware ==
/// Route middleware applying the registered `CachePolicy`.
///
/// Only 2xx responses declared as JSON, with a known length no larger than
/// the engine's `max_size_bytes`, are buffered and cached. Anything else
/// streams through untouched.
pub async fn cache_interceptor(State(layer): State<CacheLayer>, req: Request, next: Next) -> Response {
    let route = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => return next.run(req).await,
    };
    let policy = match layer.policies.resolve(req.method(), &route) {
        Some(policy) if !policy.disabled => policy.clone(),
        _ => return next.run(req).await,
    };

    let (mut parts, body) = req.into_parts();
    let request = snapshot(&mut parts, route).await;
    let key = build_request_key(&request.fingerprint(), policy.explicit_key.as_deref());

    if let Some(cached) = layer.lookup(&key).await {
        debug!(key = %key, route = %request.route, "Serving cached response");
        return mark(cached.into_response(), HIT);
    }

    let response = next.run(Request::from_parts(parts, body)).await;
    if !response.status().is_success() {
        return mark(response, MISS);
    }

    let limit = usize::try_from(layer.engine.config().max_size_bytes).unwrap_or(usize::MAX);
    let Some(length) = bufferable_length(&response, limit) else {
        debug!(key = %key, "Response is not a bounded JSON body, not caching");
        return mark(response, MISS);
    };

    let (response_parts, body) = response.into_parts();
    let bytes = match to_bytes(body, length).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to buffer response body");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(json) => {
            let observed = ResponseSnapshot {
                status: response_parts.status,
                headers: response_parts.headers.clone(),
                body: json,
            };
            if policy.allows(&request, &observed) {
                let content_type = observed
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let cached = CachedResponse {
                    status: observed.status.as_u16(),
                    content_type,
                    body: observed.body,
                };
                layer.store(&key, &policy, cached).await;
            }
        }
        Err(_) => debug!(key = %key, "Response body is not JSON, not caching"),
    }

    mark(Response::from_parts(response_parts, Body::from(bytes)), MISS)
}
