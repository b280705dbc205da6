use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Validation failed on '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Contract not found: {0}")]
    ContractNotFound(Uuid),

    #[error("Settlement instruction not found: {0}")]
    InstructionNotFound(Uuid),

    #[error("Invalid state for instruction {id}: {reason}")]
    StateConflict { id: Uuid, reason: String },

    #[error("No healthy clearing network for {0}")]
    NetworkUnavailable(String),

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn state_conflict(id: Uuid, reason: impl Into<String>) -> Self {
        Self::StateConflict {
            id,
            reason: reason.into(),
        }
    }
}

impl From<common::Error> for SettlementError {
    fn from(e: common::Error) -> Self {
        match e {
            common::Error::UnknownRegion(code) => Self::UnknownRegion(code),
            common::Error::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;
