use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Ledger view '{0}' unavailable: {1}")]
    SourceUnavailable(String, String),

    #[error("Reconciliation record not found: {0}")]
    RecordNotFound(uuid::Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<common::Error> for ReconciliationError {
    fn from(e: common::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

// Margin and settlement stores are only read through the internal ledger
// view, so their failures surface as that source being unavailable.
impl From<margin::MarginError> for ReconciliationError {
    fn from(e: margin::MarginError) -> Self {
        Self::SourceUnavailable("internal".to_string(), e.to_string())
    }
}

impl From<settlement::SettlementError> for ReconciliationError {
    fn from(e: settlement::SettlementError) -> Self {
        Self::SourceUnavailable("internal".to_string(), e.to_string())
    }
}

pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_store_errors_map_to_internal_source() {
        let e: ReconciliationError =
            margin::MarginError::InsufficientData("account 42".to_string()).into();
        assert_matches!(e, ReconciliationError::SourceUnavailable(ref s, _) if s == "internal");

        let e: ReconciliationError =
            settlement::SettlementError::Internal("store down".to_string()).into();
        assert_matches!(e, ReconciliationError::SourceUnavailable(ref s, _) if s == "internal");
    }
}
