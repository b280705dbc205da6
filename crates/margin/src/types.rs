//! Margin domain types

use chrono::{DateTime, Utc};
use common::types::{AssetClass, CollateralKind, Direction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single contract's margin-relevant exposure, as reported by the
/// position source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractExposure {
    pub contract_id: Uuid,
    /// Underlying commodity symbol, e.g. "WTI"
    pub commodity: String,
    pub asset_class: AssetClass,
    pub notional: f64,
    pub direction: Direction,
    /// Option premium for the position; None for non-options
    pub option_premium: Option<f64>,
    /// Option delta; None for non-options
    pub option_delta: Option<f64>,
}

/// Posted collateral balances for one account in one region
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollateralBalances {
    pub cash: f64,
    pub securities: f64,
    pub commodities: f64,
}

impl CollateralBalances {
    pub fn amount(&self, kind: CollateralKind) -> f64 {
        match kind {
            CollateralKind::Cash => self.cash,
            CollateralKind::Securities => self.securities,
            CollateralKind::Commodities => self.commodities,
        }
    }
}

/// Per-account, per-region margin account. Collateral is replaced via the
/// store's single mutating entry point; call history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginAccount {
    pub account_id: Uuid,
    pub region: String,
    pub collateral: CollateralBalances,
    pub calls: Vec<MarginCall>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarginAccount {
    pub fn new(account_id: Uuid, region: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            region: region.into(),
            collateral: CollateralBalances::default(),
            calls: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Calls still awaiting resolution
    pub fn open_calls(&self) -> impl Iterator<Item = &MarginCall> {
        self.calls
            .iter()
            .filter(|c| c.status == MarginCallStatus::Issued)
    }
}

/// Urgency class of a margin call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginCallType {
    /// Large deficit: due within the grace window (2h by default)
    Immediate,
    /// Due at the region's end-of-day cutoff
    EndOfDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginCallStatus {
    Issued,
    /// Cured by posting additional collateral
    Satisfied,
    /// Fail-safe liquidation fired at the due time
    AutoLiquidated,
    Expired,
}

/// A demand for additional collateral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginCall {
    pub call_id: Uuid,
    pub account_id: Uuid,
    pub region: String,
    pub call_type: MarginCallType,
    /// Collateral shortfall at issuance
    pub deficit: f64,
    /// Amount liquidated if the call goes unmet (immediate calls only)
    pub liquidation_amount: Option<f64>,
    pub status: MarginCallStatus,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Result of comparing collateral against required initial margin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginCheck {
    pub account_id: Uuid,
    pub region: String,
    pub required_initial: f64,
    pub required_maintenance: f64,
    pub collateral_value: f64,
    pub status: MarginCheckStatus,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum MarginCheckStatus {
    Adequate { surplus: f64 },
    MarginCall { deficit: f64 },
}

impl MarginCheckStatus {
    pub fn is_adequate(&self) -> bool {
        matches!(self, MarginCheckStatus::Adequate { .. })
    }
}

/// Computed portfolio-level margin for an account+region. A projection,
/// recomputed on demand; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioMargin {
    pub account_id: Uuid,
    pub region: String,
    /// Sum of standalone initial margins before netting
    pub gross_initial_margin: f64,
    /// Initial margin after the netting/diversification discount
    pub total_initial_margin: f64,
    pub total_maintenance_margin: f64,
    /// gross - netted, always >= 0
    pub netting_adjustment: f64,
    pub position_count: usize,
    pub computed_at: DateTime<Utc>,
}
