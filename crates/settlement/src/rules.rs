//! Settlement rules by asset class
//!
//! Each asset class maps to a fee schedule (basis points on notional,
//! split into clearing, settlement, and regulatory components) and a
//! settlement cycle length.

use crate::types::Obligations;
use common::types::AssetClass;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementRule {
    pub asset_class: AssetClass,
    pub clearing_fee_bps: f64,
    pub settlement_fee_bps: f64,
    pub regulatory_fee_bps: f64,
    pub settlement_days: u32,
}

impl SettlementRule {
    /// Fee/margin obligations for a gross amount
    pub fn obligations(&self, amount: f64, required_margin: f64) -> Obligations {
        let notional = amount.abs();
        Obligations {
            notional,
            clearing_fee: notional * self.clearing_fee_bps / 10_000.0,
            settlement_fee: notional * self.settlement_fee_bps / 10_000.0,
            regulatory_fee: notional * self.regulatory_fee_bps / 10_000.0,
            required_margin,
        }
    }
}

const RULES: [SettlementRule; 4] = [
    SettlementRule {
        asset_class: AssetClass::Future,
        clearing_fee_bps: 1.0,
        settlement_fee_bps: 0.5,
        regulatory_fee_bps: 0.2,
        settlement_days: 2,
    },
    SettlementRule {
        asset_class: AssetClass::Option,
        clearing_fee_bps: 1.5,
        settlement_fee_bps: 0.5,
        regulatory_fee_bps: 0.2,
        settlement_days: 2,
    },
    SettlementRule {
        asset_class: AssetClass::Swap,
        clearing_fee_bps: 2.0,
        settlement_fee_bps: 1.0,
        regulatory_fee_bps: 0.3,
        settlement_days: 3,
    },
    SettlementRule {
        asset_class: AssetClass::StructuredNote,
        clearing_fee_bps: 3.0,
        settlement_fee_bps: 1.5,
        regulatory_fee_bps: 0.5,
        settlement_days: 5,
    },
];

pub fn rule_for(asset_class: AssetClass) -> SettlementRule {
    // One rule per class by construction
    RULES
        .iter()
        .copied()
        .find(|r| r.asset_class == asset_class)
        .unwrap_or(RULES[0])
}
