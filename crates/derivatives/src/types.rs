//! Contract model

use chrono::{DateTime, NaiveDate, Utc};
use common::types::{AssetClass, Direction, SettlementType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Terminated,
    Expired,
}

impl ContractStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Expired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseStyle {
    European,
    American,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl PaymentFrequency {
    pub fn payments_per_year(&self) -> u32 {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::SemiAnnual => 2,
            Self::Annual => 1,
        }
    }
}

/// Option sensitivities from the pricing model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Type-specific contract economics. The variant is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractTerms {
    Future {
        delivery_date: NaiveDate,
        settlement_type: SettlementType,
    },
    Option {
        option_type: OptionType,
        strike: f64,
        expiry: NaiveDate,
        exercise_style: ExerciseStyle,
        /// Premium per unit at creation
        premium: f64,
        /// Recomputed on each mark-to-market pass
        greeks: Option<Greeks>,
    },
    Swap {
        fixed_rate: f64,
        floating_index: String,
        payment_frequency: PaymentFrequency,
        maturity: NaiveDate,
    },
    StructuredNote {
        payoff_structure: String,
        /// Fraction of principal protected at maturity, in [0, 1]
        principal_protection: f64,
        maturity: NaiveDate,
    },
}

impl ContractTerms {
    pub fn asset_class(&self) -> AssetClass {
        match self {
            Self::Future { .. } => AssetClass::Future,
            Self::Option { .. } => AssetClass::Option,
            Self::Swap { .. } => AssetClass::Swap,
            Self::StructuredNote { .. } => AssetClass::StructuredNote,
        }
    }
}

/// A derivative contract. Notional, type, and region are immutable after
/// creation; Greeks and margin requirement move with market data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub region: String,
    pub commodity: String,
    pub notional: f64,
    pub direction: Direction,
    pub status: ContractStatus,
    pub terms: ContractTerms,
    /// Initial margin for this contract in isolation, rebased on
    /// market-data changes
    pub margin_requirement: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
    pub termination_reason: Option<String>,
}

impl Contract {
    pub fn asset_class(&self) -> AssetClass {
        self.terms.asset_class()
    }

    pub fn is_active(&self) -> bool {
        self.status == ContractStatus::Active
    }
}

/// Request to open a future
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FutureSpec {
    pub user_id: Uuid,
    pub region: String,
    pub commodity: String,
    pub notional: f64,
    pub direction: Direction,
    pub delivery_date: NaiveDate,
    pub settlement_type: SettlementType,
}

/// Request to open an option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSpec {
    pub user_id: Uuid,
    pub region: String,
    pub commodity: String,
    pub notional: f64,
    pub direction: Direction,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub exercise_style: ExerciseStyle,
}

/// Request to open a swap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapSpec {
    pub user_id: Uuid,
    pub region: String,
    pub commodity: String,
    pub notional: f64,
    pub direction: Direction,
    pub fixed_rate: f64,
    pub floating_index: String,
    pub payment_frequency: PaymentFrequency,
    pub maturity: NaiveDate,
}

/// Request to open a structured note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSpec {
    pub user_id: Uuid,
    pub region: String,
    pub commodity: String,
    pub notional: f64,
    pub direction: Direction,
    pub payoff_structure: String,
    pub principal_protection: f64,
    pub maturity: NaiveDate,
}

/// Filter and pagination for contract listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractFilter {
    pub asset_class: Option<AssetClass>,
    pub status: Option<ContractStatus>,
    pub commodity: Option<String>,
    /// Zero-based page index
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    50
}

impl ContractFilter {
    pub fn matches(&self, contract: &Contract) -> bool {
        if let Some(class) = self.asset_class {
            if contract.asset_class() != class {
                return false;
            }
        }
        if let Some(status) = self.status {
            if contract.status != status {
                return false;
            }
        }
        if let Some(ref commodity) = self.commodity {
            if &contract.commodity != commodity {
                return false;
            }
        }
        true
    }
}

/// One page of a contract listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractPage {
    pub contracts: Vec<Contract>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}
