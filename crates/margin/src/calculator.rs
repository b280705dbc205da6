//! Standalone and portfolio margin calculation
//!
//! Standalone initial margin is `exposure_base x regional initial rate x
//! instrument risk multiplier`, where the exposure base is raw notional
//! except for options, which use premium plus delta-scaled notional.
//! Portfolio margin sums standalone margins and, where the region enables
//! portfolio margining, applies a netting discount for directionally
//! offsetting exposure in the same underlying. The discount coefficients
//! come from region configuration.

use crate::types::ContractExposure;
use common::types::{AssetClass, Direction};
use config::MarginRules;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandaloneMargin {
    pub initial: f64,
    pub maintenance: f64,
}

impl StandaloneMargin {
    pub fn zero() -> Self {
        Self {
            initial: 0.0,
            maintenance: 0.0,
        }
    }
}

/// Portfolio margin totals before/after netting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioBreakdown {
    pub gross_initial: f64,
    pub netted_initial: f64,
    pub netted_maintenance: f64,
    pub netting_adjustment: f64,
}

pub struct MarginCalculator;

impl MarginCalculator {
    pub fn new() -> Self {
        Self
    }

    /// The notional-equivalent amount margin rates apply to
    fn exposure_base(&self, exposure: &ContractExposure) -> f64 {
        match exposure.asset_class {
            AssetClass::Option => {
                let premium = exposure.option_premium.unwrap_or(0.0);
                let delta = exposure.option_delta.unwrap_or(1.0).abs();
                let scaled = premium + delta * exposure.notional;
                if scaled > 0.0 {
                    scaled
                } else {
                    exposure.notional
                }
            }
            _ => exposure.notional,
        }
    }

    /// Margin for a single contract in isolation
    pub fn standalone(
        &self,
        exposure: &ContractExposure,
        rules: &MarginRules,
    ) -> StandaloneMargin {
        let base = self.exposure_base(exposure);
        let multiplier = rules.risk_multiplier(exposure.asset_class);

        StandaloneMargin {
            initial: base * rules.initial_rate * multiplier,
            maintenance: base * rules.maintenance_rate * multiplier,
        }
    }

    /// Portfolio margin across all of an account's active exposures in a
    /// region. Netting never increases margin: the discount is capped and
    /// non-negative.
    pub fn portfolio(
        &self,
        exposures: &[ContractExposure],
        rules: &MarginRules,
    ) -> PortfolioBreakdown {
        let mut gross_initial = 0.0;
        let mut gross_maintenance = 0.0;

        // Directional initial margin per underlying, for offset credit
        let mut directional: HashMap<&str, (f64, f64)> = HashMap::new();

        for exposure in exposures {
            let margin = self.standalone(exposure, rules);
            gross_initial += margin.initial;
            gross_maintenance += margin.maintenance;

            let entry = directional.entry(exposure.commodity.as_str()).or_insert((0.0, 0.0));
            match exposure.direction {
                Direction::Long => entry.0 += margin.initial,
                Direction::Short => entry.1 += margin.initial,
            }
        }

        if !rules.portfolio_margining || gross_initial <= 0.0 {
            return PortfolioBreakdown {
                gross_initial,
                netted_initial: gross_initial,
                netted_maintenance: gross_maintenance,
                netting_adjustment: 0.0,
            };
        }

        // Offsetting long/short exposure in the same underlying earns a
        // credit; the total discount is capped as a share of gross.
        let mut discount = 0.0;
        for (long, short) in directional.values() {
            discount += long.min(*short) * rules.netting.offset_credit;
        }
        discount = discount.min(gross_initial * rules.netting.max_discount);

        let netted_initial = gross_initial - discount;
        // Maintenance scales with the same discount ratio
        let ratio = netted_initial / gross_initial;

        PortfolioBreakdown {
            gross_initial,
            netted_initial,
            netted_maintenance: gross_maintenance * ratio,
            netting_adjustment: discount,
        }
    }
}

impl Default for MarginCalculator {
    fn default() -> Self {
        Self::new()
    }
}
