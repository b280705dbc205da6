//! Batch netting across settlement instructions
//!
//! An optimization pass over a batch: instructions grouped by settlement
//! currency, with net versus gross exposure and the funding saved by
//! settling the net. Gross obligations on the individual instructions are
//! unchanged.

use crate::types::SettlementInstruction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Netting result for one currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NettingGroup {
    pub currency: String,
    pub instruction_ids: Vec<Uuid>,
    /// Sum of signed amounts
    pub net_amount: f64,
    /// Sum of absolute amounts
    pub gross_amount: f64,
    /// `gross - |net|`, the funding volume removed by netting
    pub netting_savings: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NettingReport {
    pub groups: Vec<NettingGroup>,
    pub total_gross: f64,
    pub total_savings: f64,
}

/// Group a batch by currency and compute net/gross/savings per group
pub fn compute_netting(instructions: &[SettlementInstruction]) -> NettingReport {
    // BTreeMap for a stable group order in reports
    let mut by_currency: BTreeMap<&str, Vec<&SettlementInstruction>> = BTreeMap::new();
    for instruction in instructions {
        by_currency
            .entry(instruction.currency.as_str())
            .or_default()
            .push(instruction);
    }

    let mut groups = Vec::with_capacity(by_currency.len());
    let mut total_gross = 0.0;
    let mut total_savings = 0.0;

    for (currency, members) in by_currency {
        let net_amount: f64 = members.iter().map(|i| i.amount).sum();
        let gross_amount: f64 = members.iter().map(|i| i.amount.abs()).sum();
        let netting_savings = gross_amount - net_amount.abs();

        total_gross += gross_amount;
        total_savings += netting_savings;

        groups.push(NettingGroup {
            currency: currency.to_string(),
            instruction_ids: members.iter().map(|i| i.instruction_id).collect(),
            net_amount,
            gross_amount,
            netting_savings,
        });
    }

    NettingReport {
        groups,
        total_gross,
        total_savings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarginStatus, Obligations, SettlementStatus, Workflow};
    use chrono::Utc;
    use common::types::SettlementType;

    fn instruction(amount: f64, currency: &str) -> SettlementInstruction {
        SettlementInstruction {
            instruction_id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            settlement_type: SettlementType::Cash,
            amount,
            currency: currency.to_string(),
            region: "US".to_string(),
            delivery_instructions: None,
            status: SettlementStatus::Pending,
            obligations: Obligations {
                notional: amount.abs(),
                clearing_fee: 0.0,
                settlement_fee: 0.0,
                regulatory_fee: 0.0,
                required_margin: 0.0,
            },
            margin_status: MarginStatus::Unchecked,
            network_id: None,
            workflow: Workflow::new(&[]),
            auto_settle: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            cancellation_reason: None,
            failure_reason: None,
        }
    }

    #[test]
    fn test_offsetting_amounts_net() {
        let batch = vec![instruction(500_000.0, "USD"), instruction(-300_000.0, "USD")];
        let report = compute_netting(&batch);

        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.net_amount, 200_000.0);
        assert_eq!(group.gross_amount, 800_000.0);
        assert_eq!(group.netting_savings, 600_000.0);
    }

    #[test]
    fn test_currencies_net_independently() {
        let batch = vec![
            instruction(500_000.0, "USD"),
            instruction(-500_000.0, "USD"),
            instruction(100_000.0, "EUR"),
        ];
        let report = compute_netting(&batch);

        assert_eq!(report.groups.len(), 2);
        let eur = report.groups.iter().find(|g| g.currency == "EUR").unwrap();
        assert_eq!(eur.netting_savings, 0.0);
        let usd = report.groups.iter().find(|g| g.currency == "USD").unwrap();
        assert_eq!(usd.net_amount, 0.0);
        assert_eq!(usd.netting_savings, 1_000_000.0);
    }

    #[test]
    fn test_net_never_exceeds_gross() {
        let batch = vec![
            instruction(250_000.0, "USD"),
            instruction(-400_000.0, "USD"),
            instruction(60_000.0, "USD"),
        ];
        let report = compute_netting(&batch);
        let group = &report.groups[0];

        assert!(group.net_amount.abs() <= group.gross_amount);
        assert!(group.netting_savings >= 0.0);
    }

    #[test]
    fn test_empty_batch() {
        let report = compute_netting(&[]);
        assert!(report.groups.is_empty());
        assert_eq!(report.total_gross, 0.0);
        assert_eq!(report.total_savings, 0.0);
    }
}
