//! Default values and the default configuration generator

use crate::*;
use chrono::NaiveTime;
use common::types::{AssetClass, CollateralKind, SettlementType};

pub fn default_call_grace_hours() -> u32 {
    2
}

pub fn default_immediate_call_threshold() -> f64 {
    1_000_000.0
}

pub fn default_risk_multipliers() -> RiskMultipliers {
    RiskMultipliers {
        future: 1.0,
        option: 1.2,
        swap: 0.8,
        structured_note: 1.5,
    }
}

fn region(
    code: &str,
    currency: &str,
    regime: &str,
    initial_rate: f64,
    maintenance_rate: f64,
    portfolio_margining: bool,
    period_days: u32,
    cutoff: (u32, u32),
) -> RegionConfig {
    RegionConfig {
        code: code.to_string(),
        currency: currency.to_string(),
        active: true,
        regulatory_regime: regime.to_string(),
        margin_rules: MarginRules {
            initial_rate,
            maintenance_rate,
            call_grace_hours: default_call_grace_hours(),
            portfolio_margining,
            immediate_call_threshold: default_immediate_call_threshold(),
            risk_multipliers: default_risk_multipliers(),
            netting: NettingPolicy::default(),
        },
        settlement_rules: SettlementRules {
            standard_period_days: period_days,
            methods: vec![
                SettlementType::Cash,
                SettlementType::Physical,
                SettlementType::NetCash,
            ],
            cutoff: NaiveTime::from_hms_opt(cutoff.0, cutoff.1, 0)
                .expect("valid cutoff time"),
            auto_settle_threshold: 10_000_000.0,
        },
    }
}

/// Generate a configuration with four active regions, the standard
/// collateral catalog, and a small clearing-network set
pub fn generate_default_config() -> EngineConfig {
    EngineConfig {
        engine: EngineMeta {
            name: "OpenClear".to_string(),
            description: "Derivatives settlement, margin, and reconciliation engine"
                .to_string(),
            version: "1.0.0".to_string(),
        },
        regions: vec![
            region("US", "USD", "CFTC", 0.10, 0.075, true, 2, (17, 0)),
            region("EU", "EUR", "EMIR", 0.12, 0.09, true, 2, (16, 0)),
            region("UK", "GBP", "UK-EMIR", 0.12, 0.09, false, 2, (16, 30)),
            region("APAC", "JPY", "JFSA", 0.15, 0.11, false, 3, (7, 0)),
        ],
        collateral: vec![
            CollateralType {
                kind: CollateralKind::Cash,
                haircut: 0.0,
                liquidity_score: 1.0,
                concentration_limit: 1.0,
                margin_eligible: true,
            },
            CollateralType {
                kind: CollateralKind::Securities,
                haircut: 0.15,
                liquidity_score: 0.8,
                concentration_limit: 0.6,
                margin_eligible: true,
            },
            CollateralType {
                kind: CollateralKind::Commodities,
                haircut: 0.30,
                liquidity_score: 0.4,
                concentration_limit: 0.25,
                margin_eligible: false,
            },
        ],
        networks: vec![
            ClearingNetworkConfig {
                id: "cme-clearing".to_string(),
                name: "CME Clearing".to_string(),
                region: Some("US".to_string()),
                asset_classes: vec![AssetClass::Future, AssetClass::Option],
                currencies: vec!["USD".to_string()],
                settlement_cycle_days: 1,
                connectivity: Connectivity {
                    protocol: "fix-4.4".to_string(),
                    encryption: "tls-1.3".to_string(),
                    auth_scheme: "mutual-tls".to_string(),
                },
                generic_cash_fallback: false,
            },
            ClearingNetworkConfig {
                id: "lch-swapclear".to_string(),
                name: "LCH SwapClear".to_string(),
                region: None,
                asset_classes: vec![AssetClass::Swap],
                currencies: vec![
                    "USD".to_string(),
                    "EUR".to_string(),
                    "GBP".to_string(),
                    "JPY".to_string(),
                ],
                settlement_cycle_days: 2,
                connectivity: Connectivity {
                    protocol: "swift-mx".to_string(),
                    encryption: "tls-1.3".to_string(),
                    auth_scheme: "pki".to_string(),
                },
                generic_cash_fallback: false,
            },
            ClearingNetworkConfig {
                id: "global-cash".to_string(),
                name: "Global Cash Rail".to_string(),
                region: None,
                asset_classes: AssetClass::ALL.to_vec(),
                currencies: vec![
                    "USD".to_string(),
                    "EUR".to_string(),
                    "GBP".to_string(),
                    "JPY".to_string(),
                ],
                settlement_cycle_days: 1,
                connectivity: Connectivity {
                    protocol: "iso-20022".to_string(),
                    encryption: "tls-1.3".to_string(),
                    auth_scheme: "api-key".to_string(),
                },
                generic_cash_fallback: true,
            },
        ],
        workflow: WorkflowConfig::default(),
    }
}
