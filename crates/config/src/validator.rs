use crate::*;
use common::types::CollateralKind;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Engine name is required")]
    MissingEngineName,

    #[error("No regions defined")]
    NoRegions,

    #[error("Region {code}: {message}")]
    InvalidRegion { code: String, message: String },

    #[error("Duplicate region code: {0}")]
    DuplicateRegion(String),

    #[error("At least one region must be active")]
    NoActiveRegions,

    #[error("Collateral {kind}: {message}")]
    InvalidCollateral { kind: String, message: String },

    #[error("Missing collateral catalog entry for {0}")]
    MissingCollateralKind(CollateralKind),

    #[error("Network {id}: {message}")]
    InvalidNetwork { id: String, message: String },

    #[error("No clearing networks defined")]
    NoNetworks,

    #[error("Exactly one network must be the generic cash fallback, found {count}")]
    InvalidFallbackCount { count: usize },

    #[error("Workflow: {message}")]
    InvalidWorkflow { message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

/// Validate a loaded configuration, collecting all problems rather than
/// stopping at the first
pub fn validate_config(config: &EngineConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.engine.name.trim().is_empty() {
        report.add_error(ValidationError::MissingEngineName);
    }

    validate_regions(config, &mut report);
    validate_collateral(config, &mut report);
    validate_networks(config, &mut report);
    validate_workflow(config, &mut report);

    report
}

fn validate_regions(config: &EngineConfig, report: &mut ValidationReport) {
    if config.regions.is_empty() {
        report.add_error(ValidationError::NoRegions);
        return;
    }

    let mut seen = std::collections::HashSet::new();
    for region in &config.regions {
        if !seen.insert(region.code.clone()) {
            report.add_error(ValidationError::DuplicateRegion(region.code.clone()));
        }

        let rules = &region.margin_rules;
        if rules.initial_rate <= 0.0 || rules.initial_rate >= 1.0 {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: format!(
                    "initial_rate must be in (0, 1), got {}",
                    rules.initial_rate
                ),
            });
        }
        if rules.maintenance_rate <= 0.0 || rules.maintenance_rate >= rules.initial_rate {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: "maintenance_rate must be positive and below initial_rate"
                    .to_string(),
            });
        }
        if rules.immediate_call_threshold <= 0.0 {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: "immediate_call_threshold must be positive".to_string(),
            });
        }
        if rules.netting.offset_credit < 0.0 || rules.netting.offset_credit > 1.0 {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: "netting.offset_credit must be in [0, 1]".to_string(),
            });
        }
        if rules.netting.max_discount < 0.0 || rules.netting.max_discount >= 1.0 {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: "netting.max_discount must be in [0, 1)".to_string(),
            });
        }

        let settle = &region.settlement_rules;
        if settle.methods.is_empty() {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: "settlement_rules.methods must not be empty".to_string(),
            });
        }
        if settle.standard_period_days == 0 {
            report.add_warning(
                &format!("regions.{}.settlement_rules", region.code),
                "standard_period_days of 0 means same-day settlement",
            );
        }
        if settle.auto_settle_threshold <= 0.0 {
            report.add_error(ValidationError::InvalidRegion {
                code: region.code.clone(),
                message: "auto_settle_threshold must be positive".to_string(),
            });
        }
    }

    if !config.regions.iter().any(|r| r.active) {
        report.add_error(ValidationError::NoActiveRegions);
    }
}

fn validate_collateral(config: &EngineConfig, report: &mut ValidationReport) {
    for kind in [
        CollateralKind::Cash,
        CollateralKind::Securities,
        CollateralKind::Commodities,
    ] {
        if !config.collateral.iter().any(|c| c.kind == kind) {
            report.add_error(ValidationError::MissingCollateralKind(kind));
        }
    }

    for entry in &config.collateral {
        if !(0.0..1.0).contains(&entry.haircut) {
            report.add_error(ValidationError::InvalidCollateral {
                kind: entry.kind.to_string(),
                message: format!("haircut must be in [0, 1), got {}", entry.haircut),
            });
        }
        if !(0.0..=1.0).contains(&entry.concentration_limit) {
            report.add_error(ValidationError::InvalidCollateral {
                kind: entry.kind.to_string(),
                message: "concentration_limit must be in [0, 1]".to_string(),
            });
        }
        if entry.kind == CollateralKind::Cash && entry.haircut > 0.0 {
            report.add_warning("collateral.cash", "cash normally carries no haircut");
        }
    }
}

fn validate_networks(config: &EngineConfig, report: &mut ValidationReport) {
    if config.networks.is_empty() {
        report.add_error(ValidationError::NoNetworks);
        return;
    }

    let fallback_count = config
        .networks
        .iter()
        .filter(|n| n.generic_cash_fallback)
        .count();
    if fallback_count != 1 {
        report.add_error(ValidationError::InvalidFallbackCount {
            count: fallback_count,
        });
    }

    let region_codes: std::collections::HashSet<&str> =
        config.regions.iter().map(|r| r.code.as_str()).collect();

    for network in &config.networks {
        if network.asset_classes.is_empty() {
            report.add_error(ValidationError::InvalidNetwork {
                id: network.id.clone(),
                message: "asset_classes must not be empty".to_string(),
            });
        }
        if network.currencies.is_empty() {
            report.add_error(ValidationError::InvalidNetwork {
                id: network.id.clone(),
                message: "currencies must not be empty".to_string(),
            });
        }
        if let Some(region) = &network.region {
            if !region_codes.contains(region.as_str()) {
                report.add_error(ValidationError::InvalidNetwork {
                    id: network.id.clone(),
                    message: format!("references unknown region '{}'", region),
                });
            }
        }
    }
}

fn validate_workflow(config: &EngineConfig, report: &mut ValidationReport) {
    if config.workflow.step_timeout_secs == 0 {
        report.add_error(ValidationError::InvalidWorkflow {
            message: "step_timeout_secs must be positive".to_string(),
        });
    }
    if config.workflow.max_step_retries == 0 {
        report.add_warning(
            "workflow.max_step_retries",
            "0 retries means any transient clearing failure times the step out",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_default_config;

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&generate_default_config());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let mut config = generate_default_config();
        let dup = config.regions[0].clone();
        config.regions.push(dup);

        let report = validate_config(&config);
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateRegion(_))));
    }

    #[test]
    fn test_maintenance_above_initial_rejected() {
        let mut config = generate_default_config();
        config.regions[0].margin_rules.maintenance_rate =
            config.regions[0].margin_rules.initial_rate + 0.01;

        let report = validate_config(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_missing_fallback_network_rejected() {
        let mut config = generate_default_config();
        for network in &mut config.networks {
            network.generic_cash_fallback = false;
        }

        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidFallbackCount { count: 0 })));
    }

    #[test]
    fn test_no_active_regions_rejected() {
        let mut config = generate_default_config();
        for region in &mut config.regions {
            region.active = false;
        }

        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::NoActiveRegions)));
    }
}
