//! Operation Result Module
//!
//! The uniform envelope returned by every engine operation.

use std::time::Instant;

use serde::Serialize;

use crate::error::Result;

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Relational store, used by collaborators sharing this envelope
    Persistent,
    Cache,
}

// == Storage Operation Result ==
/// Result envelope. Callers must check `success` before trusting `data`.
#[derive(Debug, Clone, Serialize)]
pub struct StorageOperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: f64,
    pub storage_type: StorageType,
}

impl<T> StorageOperationResult<T> {
    pub fn ok(data: Option<T>, started: Instant) -> Self {
        Self {
            success: true,
            data,
            error: None,
            duration_ms: elapsed_ms(started),
            storage_type: StorageType::Cache,
        }
    }

    pub fn fail(error: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration_ms: elapsed_ms(started),
            storage_type: StorageType::Cache,
        }
    }

    /// Folds a backend result into the envelope.
    pub fn from_result(result: Result<T>, started: Instant) -> Self {
        match result {
            Ok(data) => Self::ok(Some(data), started),
            Err(e) => Self::fail(e.to_string(), started),
        }
    }

    /// Returns the payload of a successful result.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            None
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
