//! Request Identity
//!
//! The authenticated caller as seen by the cache layer. Token issuance and
//! verification live upstream; this module only carries the result on the
//! request and offers a header-based stand-in for local runs and tests.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::StorageError;

/// Header carrying the authenticated subject id.
pub const SUBJECT_HEADER: &str = "x-user-id";

/// Header carrying the subject's role.
pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

/// Authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub role: Role,
}

impl Identity {
    pub fn user(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: Role::User,
        }
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Reads the identity headers, if present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let subject = headers
            .get(SUBJECT_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())?;

        let role = match headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok()) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::User,
        };

        Some(Self {
            subject: subject.to_string(),
            role,
        })
    }
}

/// Middleware attaching an `Identity` extension from the identity headers.
pub async fn attach_identity(mut req: Request, next: Next) -> Response {
    if let Some(identity) = Identity::from_headers(req.headers()) {
        req.extensions_mut().insert(identity);
    }
    next.run(req).await
}

/// Middleware rejecting callers without the admin role.
pub async fn require_admin(req: Request, next: Next) -> Response {
    let role = req.extensions().get::<Identity>().map(|identity| identity.role);

    match role {
        Some(Role::Admin) => next.run(req).await,
        Some(Role::User) => {
            tracing::debug!(path = %req.uri().path(), "Admin role required");
            StorageError::Forbidden.into_response()
        }
        None => StorageError::Unauthenticated.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(Identity::from_headers(&headers).is_none());

        headers.insert(SUBJECT_HEADER, HeaderValue::from_static("u1"));
        assert_eq!(Identity::from_headers(&headers), Some(Identity::user("u1")));

        headers.insert(ROLE_HEADER, HeaderValue::from_static("Admin"));
        assert_eq!(Identity::from_headers(&headers), Some(Identity::admin("u1")));
    }

    #[test]
    fn test_empty_subject_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(SUBJECT_HEADER, HeaderValue::from_static(""));
        assert!(Identity::from_headers(&headers).is_none());
    }
}
