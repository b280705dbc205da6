//! Margin error types

use thiserror::Error;

/// Errors that can occur during margin operations
#[derive(Error, Debug)]
pub enum MarginError {
    /// Unknown region or account: the service cannot produce a number
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Collateral posted falls below the margin requirement on a
    /// margin-gated operation
    #[error("Margin insufficient: deficit of {deficit:.2}")]
    Insufficient { deficit: f64 },

    /// Validation failure on input
    #[error("Validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<common::Error> for MarginError {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::UnknownRegion(code) => {
                MarginError::InsufficientData(format!("unknown region: {}", code))
            }
            common::Error::NotFound(what) => MarginError::InsufficientData(what),
            common::Error::Validation { field, reason } => {
                MarginError::Validation { field, reason }
            }
            other => MarginError::Internal(other.to_string()),
        }
    }
}

/// Result type for margin operations
pub type MarginResult<T> = std::result::Result<T, MarginError>;
