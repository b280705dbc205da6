use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DerivativesError {
    #[error("Validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Region inactive: {0}")]
    RegionInactive(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Contract not found: {0}")]
    ContractNotFound(Uuid),

    #[error("Contract already terminated: {0}")]
    AlreadyTerminated(Uuid),

    #[error("No market data for commodity: {0}")]
    NoMarketData(String),

    #[error("Margin computation failed: {0}")]
    Margin(#[from] margin::MarginError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DerivativesError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<common::Error> for DerivativesError {
    fn from(e: common::Error) -> Self {
        match e {
            common::Error::UnknownRegion(code) => Self::UnknownRegion(code),
            common::Error::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type DerivativesResult<T> = Result<T, DerivativesError>;
