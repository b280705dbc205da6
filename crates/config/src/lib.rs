use chrono::NaiveTime;
use common::types::{AssetClass, CollateralKind, SettlementType};
use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod registry;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use registry::*;
pub use validator::*;

/// Top-level configuration for the clearing engine. Loaded once at startup;
/// runtime changes require a restart or explicit reload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub engine: EngineMeta,
    pub regions: Vec<RegionConfig>,
    pub collateral: Vec<CollateralType>,
    pub networks: Vec<ClearingNetworkConfig>,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineMeta {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Per-region regulatory parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionConfig {
    /// Region code, e.g. "US", "EU"
    pub code: String,
    /// Settlement currency for the region
    pub currency: String,
    pub active: bool,
    /// Compliance regime tag, e.g. "CFTC", "EMIR"
    pub regulatory_regime: String,
    pub margin_rules: MarginRules,
    pub settlement_rules: SettlementRules,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarginRules {
    /// Initial margin as a fraction of notional
    pub initial_rate: f64,
    /// Maintenance margin as a fraction of notional
    pub maintenance_rate: f64,
    /// Hours an immediate margin call stays open before escalation
    #[serde(default = "defaults::default_call_grace_hours")]
    pub call_grace_hours: u32,
    /// Whether portfolio-level netting applies in this region
    pub portfolio_margining: bool,
    /// Deficits above this are called immediately instead of end-of-day
    #[serde(default = "defaults::default_immediate_call_threshold")]
    pub immediate_call_threshold: f64,
    /// Per-asset-class scaling on the regional rate
    #[serde(default = "defaults::default_risk_multipliers")]
    pub risk_multipliers: RiskMultipliers,
    /// Netting discount policy. Heuristic, not regulator-calibrated;
    /// operators tune these per region.
    #[serde(default)]
    pub netting: NettingPolicy,
}

impl MarginRules {
    pub fn risk_multiplier(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::Future => self.risk_multipliers.future,
            AssetClass::Option => self.risk_multipliers.option,
            AssetClass::Swap => self.risk_multipliers.swap,
            AssetClass::StructuredNote => self.risk_multipliers.structured_note,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskMultipliers {
    pub future: f64,
    pub option: f64,
    pub swap: f64,
    pub structured_note: f64,
}

/// Credit applied to directionally offsetting exposure in the same
/// underlying, and a cap on the total portfolio discount
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NettingPolicy {
    pub offset_credit: f64,
    pub max_discount: f64,
}

impl Default for NettingPolicy {
    fn default() -> Self {
        Self {
            offset_credit: 0.6,
            max_discount: 0.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementRules {
    /// Standard settlement period in business days (T+n)
    pub standard_period_days: u32,
    /// Settlement methods the region supports
    pub methods: Vec<SettlementType>,
    /// Daily instruction cutoff, UTC
    pub cutoff: NaiveTime,
    /// Instructions at or below this amount settle without manual review
    pub auto_settle_threshold: f64,
}

impl SettlementRules {
    pub fn supports(&self, settlement_type: SettlementType) -> bool {
        self.methods.contains(&settlement_type)
    }
}

/// A collateral type accepted by the engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollateralType {
    pub kind: CollateralKind,
    /// Valuation discount, 0.0..1.0
    pub haircut: f64,
    /// Relative liquidity, 0.0..1.0
    pub liquidity_score: f64,
    /// Maximum share of an account's collateral this kind may represent
    pub concentration_limit: f64,
    /// Whether this kind counts toward margin coverage
    pub margin_eligible: bool,
}

/// Static description of an external clearing/settlement network
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClearingNetworkConfig {
    pub id: String,
    pub name: String,
    /// None means globally available
    #[serde(default)]
    pub region: Option<String>,
    pub asset_classes: Vec<AssetClass>,
    pub currencies: Vec<String>,
    pub settlement_cycle_days: u32,
    pub connectivity: Connectivity,
    /// Catch-all cash network used when no asset-class match exists
    #[serde(default)]
    pub generic_cash_fallback: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Connectivity {
    pub protocol: String,
    pub encryption: String,
    pub auth_scheme: String,
}

/// Engine-level workflow timing knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Per-step confirmation timeout in seconds
    pub step_timeout_secs: u64,
    /// Maximum clearing-client retries per step
    pub max_step_retries: u32,
    /// Base backoff between retries in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 300,
            max_step_retries: 5,
            retry_backoff_ms: 200,
        }
    }
}
