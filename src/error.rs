//! Error types for the caching engine
//!
//! Provides unified error handling using thiserror. Engine operations fold
//! these into a `StorageOperationResult`; only the management API turns them
//! into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Storage Error Enum ==
/// Unified error type for the caching engine.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Value cannot be represented as a StorageValue
    #[error("Value is not cacheable: {0}")]
    NotCacheable(String),

    /// Stored value no longer matches what the reader expects
    #[error("validation failed")]
    ValidationFailed,

    /// Stored value is not an integer and cannot be incremented
    #[error("Value at '{0}' is not an integer")]
    NotAnInteger(String),

    /// Increment would leave the i64 range
    #[error("Increment of '{0}' would overflow")]
    Overflow(String),

    /// Operation not available on the active backend
    #[error("Operation not supported by the {0} backend")]
    Unsupported(&'static str),

    /// Glob pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Encoding or decoding of the wire form failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store I/O or protocol failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A management operation failed inside the engine
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    /// Invalid management request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Management endpoint called without an identity
    #[error("Authentication required")]
    Unauthenticated,

    /// Management endpoint called by a non-privileged identity
    #[error("Administrator role required")]
    Forbidden,
}

// == IntoResponse Implementation ==
impl IntoResponse for StorageError {
    fn into_response(self) -> Response {
        let status = match &self {
            StorageError::InvalidRequest(_) | StorageError::InvalidPattern(_) => {
                StatusCode::BAD_REQUEST
            }
            StorageError::Unauthenticated => StatusCode::UNAUTHORIZED,
            StorageError::Forbidden => StatusCode::FORBIDDEN,
            StorageError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            StorageError::Redis(_) | StorageError::Unavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching engine.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_message() {
        assert_eq!(StorageError::ValidationFailed.to_string(), "validation failed");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            StorageError::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            StorageError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            StorageError::InvalidRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StorageError::Unsupported("remote").into_response().status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }
}
