//! Read-only lookup views over the loaded configuration
//!
//! These are built once at startup and shared across all concurrent
//! workflows without locking.

use crate::{CollateralType, EngineConfig, MarginRules, RegionConfig, SettlementRules};
use common::types::CollateralKind;
use common::{Error, Result};
use std::collections::HashMap;

/// Region lookup keyed by region code
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    regions: HashMap<String, RegionConfig>,
}

impl RegionRegistry {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            regions: config
                .regions
                .iter()
                .map(|r| (r.code.clone(), r.clone()))
                .collect(),
        }
    }

    /// Look up a region, failing with `UnknownRegion` for unregistered codes
    pub fn get(&self, region: &str) -> Result<&RegionConfig> {
        self.regions
            .get(region)
            .ok_or_else(|| Error::UnknownRegion(region.to_string()))
    }

    pub fn is_active(&self, region: &str) -> bool {
        self.regions.get(region).map(|r| r.active).unwrap_or(false)
    }

    pub fn margin_rules(&self, region: &str) -> Result<&MarginRules> {
        Ok(&self.get(region)?.margin_rules)
    }

    pub fn settlement_rules(&self, region: &str) -> Result<&SettlementRules> {
        Ok(&self.get(region)?.settlement_rules)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(|s| s.as_str())
    }
}

/// Collateral haircut/eligibility lookup
#[derive(Debug, Clone)]
pub struct CollateralCatalog {
    entries: HashMap<CollateralKind, CollateralType>,
}

impl CollateralCatalog {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            entries: config
                .collateral
                .iter()
                .map(|c| (c.kind, c.clone()))
                .collect(),
        }
    }

    pub fn get(&self, kind: CollateralKind) -> Result<&CollateralType> {
        self.entries
            .get(&kind)
            .ok_or_else(|| Error::config(format!("no collateral catalog entry for {}", kind)))
    }

    pub fn haircut(&self, kind: CollateralKind) -> Result<f64> {
        Ok(self.get(kind)?.haircut)
    }

    pub fn is_margin_eligible(&self, kind: CollateralKind) -> bool {
        self.entries
            .get(&kind)
            .map(|c| c.margin_eligible)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_default_config;
    use assert_matches::assert_matches;

    #[test]
    fn test_unknown_region_errors() {
        let registry = RegionRegistry::from_config(&generate_default_config());
        assert_matches!(registry.get("MARS"), Err(Error::UnknownRegion(_)));
        assert!(registry.get("US").is_ok());
    }

    #[test]
    fn test_inactive_region_reported() {
        let mut config = generate_default_config();
        config.regions[0].active = false;
        let code = config.regions[0].code.clone();

        let registry = RegionRegistry::from_config(&config);
        assert!(!registry.is_active(&code));
        assert!(!registry.is_active("MARS"));
    }

    #[test]
    fn test_commodities_not_margin_eligible_by_default() {
        let catalog = CollateralCatalog::from_config(&generate_default_config());
        assert!(catalog.is_margin_eligible(CollateralKind::Cash));
        assert!(catalog.is_margin_eligible(CollateralKind::Securities));
        assert!(!catalog.is_margin_eligible(CollateralKind::Commodities));
    }

    #[test]
    fn test_haircuts() {
        let catalog = CollateralCatalog::from_config(&generate_default_config());
        assert_eq!(catalog.haircut(CollateralKind::Cash).unwrap(), 0.0);
        assert!(catalog.haircut(CollateralKind::Securities).unwrap() > 0.0);
    }
}
