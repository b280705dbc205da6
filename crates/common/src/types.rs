//! Core domain types shared across OpenClear crates

use serde::{Deserialize, Serialize};

/// Asset class of a derivative contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Exchange-traded future with a delivery date
    Future,
    /// Vanilla option (call or put)
    Option,
    /// Fixed-for-floating swap
    Swap,
    /// Structured note with a custom payoff
    StructuredNote,
}

impl AssetClass {
    /// All asset classes, in display order
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Future,
        AssetClass::Option,
        AssetClass::Swap,
        AssetClass::StructuredNote,
    ];
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Future => write!(f, "future"),
            AssetClass::Option => write!(f, "option"),
            AssetClass::Swap => write!(f, "swap"),
            AssetClass::StructuredNote => write!(f, "structured_note"),
        }
    }
}

/// How a settlement obligation is discharged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementType {
    /// Cash-settled against the reference price
    Cash,
    /// Physical delivery of the underlying commodity
    Physical,
    /// Cash settlement of a netted batch amount
    NetCash,
}

impl std::fmt::Display for SettlementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementType::Cash => write!(f, "cash"),
            SettlementType::Physical => write!(f, "physical"),
            SettlementType::NetCash => write!(f, "net_cash"),
        }
    }
}

impl std::str::FromStr for SettlementType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(SettlementType::Cash),
            "physical" => Ok(SettlementType::Physical),
            "net_cash" | "netcash" => Ok(SettlementType::NetCash),
            _ => Err(format!("unknown settlement type: {}", s)),
        }
    }
}

/// Kind of collateral posted to a margin account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralKind {
    Cash,
    Securities,
    Commodities,
}

impl std::fmt::Display for CollateralKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollateralKind::Cash => write!(f, "cash"),
            CollateralKind::Securities => write!(f, "securities"),
            CollateralKind::Commodities => write!(f, "commodities"),
        }
    }
}

/// Direction of an exposure (drives netting offsets and settlement sign)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Sign applied to amounts for this direction
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}
