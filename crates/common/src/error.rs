//! Common error types for OpenClear

use thiserror::Error;

/// Common error type used across OpenClear crates
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input; `field` identifies the offending
    /// request field so the caller can correct it
    #[error("Validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation invalid for the entity's current status
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Region code is not registered in the configuration
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error for a named field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a state conflict error
    pub fn state_conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
