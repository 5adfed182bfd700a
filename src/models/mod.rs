//! Request and Response models for the cache management API
//!
//! DTOs used for serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidateRequest, KeysQuery};
pub use responses::{HealthResponse, KeyInfoResponse};
