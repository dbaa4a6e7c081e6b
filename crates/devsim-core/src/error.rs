//! Error taxonomy shared by every layer of the service.
//!
//! Each variant maps to one stable status at the HTTP boundary so callers can
//! branch on it: fix the payload, re-fetch and retry, or give up.

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A payload failed validation. Nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Path of the offending member, e.g. `Telemetry[0].Interval`.
    pub field: String,
    /// Why the member was rejected.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A whole-body rejection, e.g. a JSON document that does not decode.
    pub fn body(reason: impl Into<String>) -> Self {
        Self::new("body", reason)
    }
}

/// Service error kinds.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing field.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// ETag mismatch or duplicate Id.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation on a protected entity.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown Id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Provisioning bridge failure.
    #[error("Provisioning error: {0}")]
    Provisioning(String),
}

impl Error {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// True for errors caused by the request rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Provisioning(_))
    }
}
