//! Derivatives Service - contract lifecycle

use crate::error::{DerivativesError, DerivativesResult};
use crate::market::{MarketDataStore, MarketQuote};
use crate::pricing::{self, PricingInputs};
use crate::store::ContractStore;
use crate::types::{
    Contract, ContractFilter, ContractPage, ContractStatus, ContractTerms, FutureSpec, NoteSpec,
    OptionSpec, SwapSpec,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use config::RegionRegistry;
use margin::{ContractExposure, MarginCalculator, PositionSource};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Largest notional accepted on any single contract
const MAX_NOTIONAL: f64 = 1_000_000_000.0;

pub struct DerivativesService {
    store: Arc<dyn ContractStore>,
    regions: Arc<RegionRegistry>,
    market: Arc<MarketDataStore>,
    calculator: MarginCalculator,
}

impl DerivativesService {
    pub fn new(
        store: Arc<dyn ContractStore>,
        regions: Arc<RegionRegistry>,
        market: Arc<MarketDataStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            regions,
            market,
            calculator: MarginCalculator::new(),
        })
    }

    pub fn market_data(&self) -> &MarketDataStore {
        &self.market
    }

    fn validate_base(
        &self,
        region: &str,
        commodity: &str,
        notional: f64,
    ) -> DerivativesResult<()> {
        let config = self.regions.get(region)?;
        if !config.active {
            return Err(DerivativesError::RegionInactive(region.to_string()));
        }
        if commodity.trim().is_empty() {
            return Err(DerivativesError::validation("commodity", "must not be empty"));
        }
        if !(notional > 0.0) || !notional.is_finite() {
            return Err(DerivativesError::validation(
                "notional",
                format!("must be positive, got {}", notional),
            ));
        }
        if notional > MAX_NOTIONAL {
            return Err(DerivativesError::validation(
                "notional",
                format!("exceeds maximum of {}", MAX_NOTIONAL),
            ));
        }
        Ok(())
    }

    fn require_future_date(field: &str, date: NaiveDate) -> DerivativesResult<()> {
        if date <= Utc::now().date_naive() {
            return Err(DerivativesError::validation(
                field,
                format!("{} is not in the future", date),
            ));
        }
        Ok(())
    }

    async fn persist(&self, contract: Contract) -> DerivativesResult<Contract> {
        metrics::counter!(
            "contracts_created_total",
            "asset_class" => contract.asset_class().to_string(),
            "region" => contract.region.clone()
        )
        .increment(1);
        info!(
            contract = %contract.contract_id,
            user = %contract.user_id,
            region = %contract.region,
            class = %contract.asset_class(),
            notional = contract.notional,
            margin = contract.margin_requirement,
            "contract created"
        );
        self.store.insert(contract.clone()).await?;
        Ok(contract)
    }

    fn build_contract(
        &self,
        user_id: Uuid,
        region: &str,
        commodity: &str,
        notional: f64,
        direction: common::types::Direction,
        terms: ContractTerms,
    ) -> DerivativesResult<Contract> {
        let now = Utc::now();
        let mut contract = Contract {
            contract_id: Uuid::new_v4(),
            user_id,
            region: region.to_string(),
            commodity: commodity.to_string(),
            notional,
            direction,
            status: ContractStatus::Active,
            terms,
            margin_requirement: 0.0,
            created_at: now,
            updated_at: now,
            terminated_at: None,
            termination_reason: None,
        };
        contract.margin_requirement = self.margin_for(&contract)?;
        Ok(contract)
    }

    fn margin_for(&self, contract: &Contract) -> DerivativesResult<f64> {
        let rules = self.regions.margin_rules(&contract.region)?;
        let exposure = exposure_of(contract);
        Ok(self.calculator.standalone(&exposure, rules).initial)
    }

    pub async fn create_future(&self, spec: FutureSpec) -> DerivativesResult<Contract> {
        self.validate_base(&spec.region, &spec.commodity, spec.notional)?;
        Self::require_future_date("delivery_date", spec.delivery_date)?;

        let rules = self.regions.settlement_rules(&spec.region)?;
        if !rules.supports(spec.settlement_type) {
            return Err(DerivativesError::validation(
                "settlement_type",
                format!(
                    "{} settlement is not offered in {}",
                    spec.settlement_type, spec.region
                ),
            ));
        }

        let contract = self.build_contract(
            spec.user_id,
            &spec.region,
            &spec.commodity,
            spec.notional,
            spec.direction,
            ContractTerms::Future {
                delivery_date: spec.delivery_date,
                settlement_type: spec.settlement_type,
            },
        )?;
        self.persist(contract).await
    }

    pub async fn create_option(&self, spec: OptionSpec) -> DerivativesResult<Contract> {
        self.validate_base(&spec.region, &spec.commodity, spec.notional)?;
        Self::require_future_date("expiry", spec.expiry)?;
        if !(spec.strike > 0.0) || !spec.strike.is_finite() {
            return Err(DerivativesError::validation(
                "strike",
                format!("must be positive, got {}", spec.strike),
            ));
        }

        let quote = self
            .market
            .get(&spec.commodity)
            .ok_or_else(|| DerivativesError::NoMarketData(spec.commodity.clone()))?;

        let inputs = PricingInputs {
            spot: quote.spot,
            strike: spec.strike,
            time: years_to(spec.expiry),
            vol: quote.volatility,
            rate: quote.risk_free_rate,
            option_type: spec.option_type,
        };
        let premium = pricing::option_price(inputs);
        let greeks = pricing::option_greeks(inputs);

        let contract = self.build_contract(
            spec.user_id,
            &spec.region,
            &spec.commodity,
            spec.notional,
            spec.direction,
            ContractTerms::Option {
                option_type: spec.option_type,
                strike: spec.strike,
                expiry: spec.expiry,
                exercise_style: spec.exercise_style,
                premium,
                greeks: Some(greeks),
            },
        )?;
        self.persist(contract).await
    }

    pub async fn create_swap(&self, spec: SwapSpec) -> DerivativesResult<Contract> {
        self.validate_base(&spec.region, &spec.commodity, spec.notional)?;
        Self::require_future_date("maturity", spec.maturity)?;
        if spec.fixed_rate < 0.0 || !spec.fixed_rate.is_finite() {
            return Err(DerivativesError::validation(
                "fixed_rate",
                format!("must be non-negative, got {}", spec.fixed_rate),
            ));
        }
        if spec.floating_index.trim().is_empty() {
            return Err(DerivativesError::validation(
                "floating_index",
                "must not be empty",
            ));
        }

        let contract = self.build_contract(
            spec.user_id,
            &spec.region,
            &spec.commodity,
            spec.notional,
            spec.direction,
            ContractTerms::Swap {
                fixed_rate: spec.fixed_rate,
                floating_index: spec.floating_index,
                payment_frequency: spec.payment_frequency,
                maturity: spec.maturity,
            },
        )?;
        self.persist(contract).await
    }

    pub async fn create_structured_note(&self, spec: NoteSpec) -> DerivativesResult<Contract> {
        self.validate_base(&spec.region, &spec.commodity, spec.notional)?;
        Self::require_future_date("maturity", spec.maturity)?;
        if !(0.0..=1.0).contains(&spec.principal_protection) {
            return Err(DerivativesError::validation(
                "principal_protection",
                format!("must be within [0, 1], got {}", spec.principal_protection),
            ));
        }
        if spec.payoff_structure.trim().is_empty() {
            return Err(DerivativesError::validation(
                "payoff_structure",
                "must not be empty",
            ));
        }

        let contract = self.build_contract(
            spec.user_id,
            &spec.region,
            &spec.commodity,
            spec.notional,
            spec.direction,
            ContractTerms::StructuredNote {
                payoff_structure: spec.payoff_structure,
                principal_protection: spec.principal_protection,
                maturity: spec.maturity,
            },
        )?;
        self.persist(contract).await
    }

    /// Publish a new quote and run a mark-to-market pass over live option
    /// contracts on the commodity. Returns the new snapshot version and
    /// the number of contracts repriced.
    pub async fn update_market_data(
        &self,
        commodity: &str,
        quote: MarketQuote,
    ) -> DerivativesResult<(u64, usize)> {
        if !(quote.spot > 0.0) || !quote.spot.is_finite() {
            return Err(DerivativesError::validation(
                "spot",
                format!("must be positive, got {}", quote.spot),
            ));
        }
        if quote.volatility < 0.0 || quote.risk_free_rate.is_nan() {
            return Err(DerivativesError::validation(
                "volatility/risk_free_rate",
                "out of range",
            ));
        }

        let version = self.market.update(commodity, quote);
        let repriced = self.mark_to_market(commodity, quote).await?;
        info!(commodity, version, repriced, "market data published");
        Ok((version, repriced))
    }

    /// Recompute premium, Greeks, and margin requirement for every active
    /// option contract on a commodity against the given quote.
    async fn mark_to_market(&self, commodity: &str, quote: MarketQuote) -> DerivativesResult<usize> {
        let contracts = self.store.list_active_by_commodity(commodity).await?;
        let mut repriced = 0;

        for mut contract in contracts {
            let ContractTerms::Option {
                option_type,
                strike,
                expiry,
                ref mut premium,
                ref mut greeks,
                ..
            } = contract.terms
            else {
                continue;
            };

            let inputs = PricingInputs {
                spot: quote.spot,
                strike,
                time: years_to(expiry),
                vol: quote.volatility,
                rate: quote.risk_free_rate,
                option_type,
            };
            *premium = pricing::option_price(inputs);
            *greeks = Some(pricing::option_greeks(inputs));

            contract.margin_requirement = self.margin_for(&contract)?;
            contract.updated_at = Utc::now();
            debug!(contract = %contract.contract_id, commodity, "contract repriced");
            self.store.update(contract).await?;
            repriced += 1;
        }

        Ok(repriced)
    }

    pub async fn get_contract(&self, contract_id: Uuid) -> DerivativesResult<Contract> {
        self.store
            .get(contract_id)
            .await?
            .ok_or(DerivativesError::ContractNotFound(contract_id))
    }

    pub async fn terminate_contract(
        &self,
        contract_id: Uuid,
        reason: impl Into<String>,
    ) -> DerivativesResult<Contract> {
        let mut contract = self.get_contract(contract_id).await?;
        if contract.status.is_terminal() {
            return Err(DerivativesError::AlreadyTerminated(contract_id));
        }

        contract.status = ContractStatus::Terminated;
        contract.terminated_at = Some(Utc::now());
        contract.termination_reason = Some(reason.into());
        contract.updated_at = Utc::now();

        info!(
            contract = %contract_id,
            reason = contract.termination_reason.as_deref().unwrap_or(""),
            "contract terminated"
        );
        self.store.update(contract.clone()).await?;
        Ok(contract)
    }

    pub async fn get_user_contracts(
        &self,
        user_id: Uuid,
        region: &str,
        filter: &ContractFilter,
    ) -> DerivativesResult<ContractPage> {
        let matched: Vec<Contract> = self
            .store
            .list_for_user(user_id, region)
            .await?
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();

        let total = matched.len();
        let page_size = filter.page_size.max(1);
        let contracts = matched
            .into_iter()
            .skip(filter.page * page_size)
            .take(page_size)
            .collect();

        Ok(ContractPage {
            contracts,
            page: filter.page,
            page_size,
            total,
        })
    }
}

/// Margin exposure view of a contract. Options carry premium and delta so
/// the margin engine can scale exposure instead of using raw notional.
fn exposure_of(contract: &Contract) -> ContractExposure {
    let (option_premium, option_delta) = match &contract.terms {
        ContractTerms::Option {
            premium, greeks, ..
        } => (
            Some(*premium),
            greeks.map(|g| g.delta),
        ),
        _ => (None, None),
    };

    ContractExposure {
        contract_id: contract.contract_id,
        commodity: contract.commodity.clone(),
        asset_class: contract.asset_class(),
        notional: contract.notional,
        direction: contract.direction,
        option_premium,
        option_delta,
    }
}

fn years_to(date: NaiveDate) -> f64 {
    let days = (date - Utc::now().date_naive()).num_days();
    days.max(0) as f64 / 365.25
}

#[async_trait]
impl PositionSource for DerivativesService {
    async fn active_exposures(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> common::Result<Vec<ContractExposure>> {
        Ok(self
            .store
            .list_for_user(account_id, region)
            .await?
            .iter()
            .filter(|c| c.is_active())
            .map(exposure_of)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryContractStore;
    use crate::types::{ExerciseStyle, OptionType, PaymentFrequency};
    use assert_matches::assert_matches;
    use chrono::Duration;
    use common::types::{Direction, SettlementType};
    use config::generate_default_config;

    fn build_service() -> Arc<DerivativesService> {
        let market = Arc::new(MarketDataStore::new());
        market.update(
            "WTI",
            MarketQuote {
                spot: 75.0,
                volatility: 0.35,
                risk_free_rate: 0.04,
            },
        );
        DerivativesService::new(
            InMemoryContractStore::new(),
            Arc::new(RegionRegistry::from_config(&generate_default_config())),
            market,
        )
    }

    fn future_date(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }

    fn wti_future(user_id: Uuid) -> FutureSpec {
        FutureSpec {
            user_id,
            region: "US".to_string(),
            commodity: "WTI".to_string(),
            notional: 1_000_000.0,
            direction: Direction::Long,
            delivery_date: future_date(90),
            settlement_type: SettlementType::Cash,
        }
    }

    fn wti_option(user_id: Uuid) -> OptionSpec {
        OptionSpec {
            user_id,
            region: "US".to_string(),
            commodity: "WTI".to_string(),
            notional: 500_000.0,
            direction: Direction::Long,
            option_type: OptionType::Call,
            strike: 80.0,
            expiry: future_date(60),
            exercise_style: ExerciseStyle::European,
        }
    }

    #[tokio::test]
    async fn test_create_future_sizes_margin() {
        let service = build_service();
        let contract = service.create_future(wti_future(Uuid::new_v4())).await.unwrap();

        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.region, "US");
        // US initial rate 10%, future multiplier 1.0
        assert!(contract.margin_requirement > 0.0);
        assert!(contract.margin_requirement <= contract.notional);
        assert_eq!(contract.margin_requirement, 100_000.0);
    }

    #[tokio::test]
    async fn test_create_option_computes_greeks() {
        let service = build_service();
        let contract = service.create_option(wti_option(Uuid::new_v4())).await.unwrap();

        let ContractTerms::Option {
            premium, greeks, ..
        } = contract.terms
        else {
            panic!("expected option terms");
        };
        let greeks = greeks.unwrap();
        assert!(premium > 0.0);
        assert!(greeks.delta > 0.0 && greeks.delta < 1.0);
        assert!(contract.margin_requirement > 0.0);
    }

    #[tokio::test]
    async fn test_create_option_without_market_data() {
        let service = build_service();
        let spec = OptionSpec {
            commodity: "NATGAS".to_string(),
            ..wti_option(Uuid::new_v4())
        };
        assert_matches!(
            service.create_option(spec).await,
            Err(DerivativesError::NoMarketData(_))
        );
    }

    #[tokio::test]
    async fn test_create_swap_and_note() {
        let service = build_service();
        let user = Uuid::new_v4();

        let swap = service
            .create_swap(SwapSpec {
                user_id: user,
                region: "US".to_string(),
                commodity: "WTI".to_string(),
                notional: 2_000_000.0,
                direction: Direction::Short,
                fixed_rate: 0.045,
                floating_index: "SOFR".to_string(),
                payment_frequency: PaymentFrequency::Quarterly,
                maturity: future_date(365),
            })
            .await
            .unwrap();
        // Swap multiplier 0.8 on the 10% initial rate
        assert_eq!(swap.margin_requirement, 160_000.0);

        let note = service
            .create_structured_note(NoteSpec {
                user_id: user,
                region: "US".to_string(),
                commodity: "WTI".to_string(),
                notional: 1_000_000.0,
                direction: Direction::Long,
                payoff_structure: "autocallable".to_string(),
                principal_protection: 0.9,
                maturity: future_date(730),
            })
            .await
            .unwrap();
        // Structured-note multiplier 1.5
        assert_eq!(note.margin_requirement, 150_000.0);
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let service = build_service();
        let user = Uuid::new_v4();

        let negative = FutureSpec {
            notional: -5.0,
            ..wti_future(user)
        };
        assert_matches!(
            service.create_future(negative).await,
            Err(DerivativesError::Validation { ref field, .. }) if field == "notional"
        );

        let past = FutureSpec {
            delivery_date: future_date(-1),
            ..wti_future(user)
        };
        assert_matches!(
            service.create_future(past).await,
            Err(DerivativesError::Validation { ref field, .. }) if field == "delivery_date"
        );

        let unknown_region = FutureSpec {
            region: "MARS".to_string(),
            ..wti_future(user)
        };
        assert_matches!(
            service.create_future(unknown_region).await,
            Err(DerivativesError::UnknownRegion(_))
        );

        let bad_protection = NoteSpec {
            user_id: user,
            region: "US".to_string(),
            commodity: "WTI".to_string(),
            notional: 1_000_000.0,
            direction: Direction::Long,
            payoff_structure: "autocallable".to_string(),
            principal_protection: 1.5,
            maturity: future_date(730),
        };
        assert_matches!(
            service.create_structured_note(bad_protection).await,
            Err(DerivativesError::Validation { ref field, .. }) if field == "principal_protection"
        );
    }

    #[tokio::test]
    async fn test_inactive_region_rejected() {
        let mut config = generate_default_config();
        config.regions[0].active = false;
        let code = config.regions[0].code.clone();

        let service = DerivativesService::new(
            InMemoryContractStore::new(),
            Arc::new(RegionRegistry::from_config(&config)),
            Arc::new(MarketDataStore::new()),
        );

        let spec = FutureSpec {
            region: code,
            ..wti_future(Uuid::new_v4())
        };
        assert_matches!(
            service.create_future(spec).await,
            Err(DerivativesError::RegionInactive(_))
        );
    }

    #[tokio::test]
    async fn test_terminate_contract_once() {
        let service = build_service();
        let contract = service.create_future(wti_future(Uuid::new_v4())).await.unwrap();

        let terminated = service
            .terminate_contract(contract.contract_id, "client request")
            .await
            .unwrap();
        assert_eq!(terminated.status, ContractStatus::Terminated);
        assert!(terminated.terminated_at.is_some());

        assert_matches!(
            service.terminate_contract(contract.contract_id, "again").await,
            Err(DerivativesError::AlreadyTerminated(_))
        );
        assert_matches!(
            service.terminate_contract(Uuid::new_v4(), "missing").await,
            Err(DerivativesError::ContractNotFound(_))
        );
    }

    #[tokio::test]
    async fn test_mark_to_market_reprices_options() {
        let service = build_service();
        let user = Uuid::new_v4();

        let option = service.create_option(wti_option(user)).await.unwrap();
        let future = service.create_future(wti_future(user)).await.unwrap();
        let before = service.get_contract(option.contract_id).await.unwrap();

        // Spot jump deep in the money
        let (version, repriced) = service
            .update_market_data(
                "WTI",
                MarketQuote {
                    spot: 120.0,
                    volatility: 0.35,
                    risk_free_rate: 0.04,
                },
            )
            .await
            .unwrap();

        assert_eq!(version, 2);
        // Only the option is repriced; the future holds its margin
        assert_eq!(repriced, 1);

        let after = service.get_contract(option.contract_id).await.unwrap();
        let (ContractTerms::Option { premium: p0, greeks: g0, .. },
             ContractTerms::Option { premium: p1, greeks: g1, .. }) =
            (before.terms, after.terms)
        else {
            panic!("expected option terms");
        };
        assert!(p1 > p0);
        assert!(g1.unwrap().delta > g0.unwrap().delta);

        let future_after = service.get_contract(future.contract_id).await.unwrap();
        assert_eq!(future_after.margin_requirement, future.margin_requirement);
    }

    #[tokio::test]
    async fn test_user_contract_listing_filters_and_pages() {
        let service = build_service();
        let user = Uuid::new_v4();

        for _ in 0..3 {
            service.create_future(wti_future(user)).await.unwrap();
        }
        service.create_option(wti_option(user)).await.unwrap();

        let all = service
            .get_user_contracts(user, "US", &ContractFilter::default())
            .await
            .unwrap();
        assert_eq!(all.total, 4);

        let futures_only = service
            .get_user_contracts(
                user,
                "US",
                &ContractFilter {
                    asset_class: Some(common::types::AssetClass::Future),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(futures_only.total, 3);

        let page = service
            .get_user_contracts(
                user,
                "US",
                &ContractFilter {
                    page: 1,
                    page_size: 3,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.contracts.len(), 1);
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn test_position_source_excludes_terminated() {
        let service = build_service();
        let user = Uuid::new_v4();

        let keep = service.create_future(wti_future(user)).await.unwrap();
        let drop = service.create_future(wti_future(user)).await.unwrap();
        service
            .terminate_contract(drop.contract_id, "closed out")
            .await
            .unwrap();

        let exposures = service.active_exposures(user, "US").await.unwrap();
        assert_eq!(exposures.len(), 1);
        assert_eq!(exposures[0].contract_id, keep.contract_id);
    }
}
