//! Reconciliation model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationType {
    Daily,
    Weekly,
    Monthly,
}

/// One source's view of an account: position count, cash, posted margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub source: String,
    pub position_count: u64,
    pub cash_balance: f64,
    pub margin_balance: f64,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakCategory {
    Position,
    Cash,
    Margin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakSeverity {
    Low,
    Medium,
    High,
}

/// A detected mismatch in one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationBreak {
    pub category: BreakCategory,
    pub severity: BreakSeverity,
    /// Number of external sources disagreeing with the internal view
    pub count: u32,
    /// Largest absolute value difference across disagreeing sources
    pub value_impact: f64,
    pub description: String,
    pub auto_resolved: bool,
}

/// Outcome of the auto-resolution pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub auto_resolved: u32,
    pub manual_required: u32,
    pub suggested_actions: Vec<String>,
}

/// Immutable record of one reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub record_id: Uuid,
    pub account_id: Uuid,
    pub region: String,
    pub recon_type: ReconciliationType,
    pub snapshots: Vec<LedgerSnapshot>,
    pub breaks: Vec<ReconciliationBreak>,
    pub resolution: Resolution,
    pub run_at: DateTime<Utc>,
}

impl ReconciliationRecord {
    pub fn is_clean(&self) -> bool {
        self.breaks.is_empty()
    }

    pub fn open_breaks(&self) -> impl Iterator<Item = &ReconciliationBreak> {
        self.breaks.iter().filter(|b| !b.auto_resolved)
    }
}
