//! Margin Service - collateral checks, portfolio margin, margin calls

use crate::calculator::{MarginCalculator, StandaloneMargin};
use crate::calls;
use crate::error::{MarginError, MarginResult};
use crate::store::MarginAccountStore;
use crate::types::{
    CollateralBalances, ContractExposure, MarginCall, MarginCallStatus, MarginCallType,
    MarginCheck, MarginCheckStatus, PortfolioMargin,
};
use async_trait::async_trait;
use chrono::Utc;
use common::outbox::{Notification, NotificationTopic, Outbox};
use common::types::CollateralKind;
use config::{CollateralCatalog, RegionRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Source of an account's active contract exposures. Implemented by the
/// derivatives service; mocked in tests.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn active_exposures(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> common::Result<Vec<ContractExposure>>;
}

/// Margin Service - computes margin, tracks collateral, issues calls
pub struct MarginService {
    calculator: MarginCalculator,
    accounts: Arc<dyn MarginAccountStore>,
    positions: Arc<dyn PositionSource>,
    regions: Arc<RegionRegistry>,
    catalog: Arc<CollateralCatalog>,
    outbox: Arc<Outbox>,
    /// Cancellation handles for pending auto-liquidations, keyed by call
    /// id. Entries are removed on cure and when the timer task finishes.
    liquidation_tokens: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl MarginService {
    pub fn new(
        accounts: Arc<dyn MarginAccountStore>,
        positions: Arc<dyn PositionSource>,
        regions: Arc<RegionRegistry>,
        catalog: Arc<CollateralCatalog>,
        outbox: Arc<Outbox>,
    ) -> Arc<Self> {
        Arc::new(Self {
            calculator: MarginCalculator::new(),
            accounts,
            positions,
            regions,
            catalog,
            outbox,
            liquidation_tokens: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Margin for a single contract in isolation. Used at contract
    /// creation to derive the stored margin requirement.
    pub fn standalone_margin(
        &self,
        exposure: &ContractExposure,
        region: &str,
    ) -> MarginResult<StandaloneMargin> {
        let rules = self.regions.margin_rules(region)?;
        Ok(self.calculator.standalone(exposure, rules))
    }

    /// Portfolio-level margin for an account in a region. A computed
    /// projection; nothing is persisted.
    pub async fn portfolio_margin(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> MarginResult<PortfolioMargin> {
        let rules = self.regions.margin_rules(region)?;
        let exposures = self.positions.active_exposures(account_id, region).await?;
        let breakdown = self.calculator.portfolio(&exposures, rules);

        Ok(PortfolioMargin {
            account_id,
            region: region.to_string(),
            gross_initial_margin: breakdown.gross_initial,
            total_initial_margin: breakdown.netted_initial,
            total_maintenance_margin: breakdown.netted_maintenance,
            netting_adjustment: breakdown.netting_adjustment,
            position_count: exposures.len(),
            computed_at: Utc::now(),
        })
    }

    /// Value collateral at catalog haircuts. Kinds not margin-eligible
    /// (commodities by default) contribute nothing.
    fn collateral_value(&self, balances: &CollateralBalances) -> MarginResult<f64> {
        let mut value = 0.0;
        for kind in [
            CollateralKind::Cash,
            CollateralKind::Securities,
            CollateralKind::Commodities,
        ] {
            if !self.catalog.is_margin_eligible(kind) {
                continue;
            }
            let haircut = self.catalog.haircut(kind)?;
            value += balances.amount(kind) * (1.0 - haircut);
        }
        Ok(value)
    }

    /// Compare posted collateral against the portfolio initial margin.
    /// A deficit issues a margin call (at most one open call per account);
    /// a surplus cures any open calls.
    pub async fn check_margin_requirements(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> MarginResult<MarginCheck> {
        let account = self
            .accounts
            .get(account_id, region)
            .await?
            .ok_or_else(|| {
                MarginError::InsufficientData(format!(
                    "no margin account for {} in {}",
                    account_id, region
                ))
            })?;

        let portfolio = self.portfolio_margin(account_id, region).await?;
        let collateral_value = self.collateral_value(&account.collateral)?;
        let required = portfolio.total_initial_margin;

        let status = if collateral_value >= required {
            let surplus = collateral_value - required;
            self.cure_open_calls(&account.calls, account_id, region).await?;
            MarginCheckStatus::Adequate { surplus }
        } else {
            let deficit = required - collateral_value;
            self.issue_call_if_needed(&account.calls, account_id, region, deficit)
                .await?;
            MarginCheckStatus::MarginCall { deficit }
        };

        debug!(
            account = %account_id,
            region,
            required,
            collateral_value,
            adequate = status.is_adequate(),
            "margin check"
        );

        Ok(MarginCheck {
            account_id,
            region: region.to_string(),
            required_initial: required,
            required_maintenance: portfolio.total_maintenance_margin,
            collateral_value,
            status,
            checked_at: Utc::now(),
        })
    }

    /// Replace the account's posted collateral and immediately re-check.
    /// This is the single mutating entry point for collateral.
    pub async fn update_user_collateral(
        &self,
        account_id: Uuid,
        collateral: CollateralBalances,
        region: &str,
    ) -> MarginResult<MarginCheck> {
        for (field, amount) in [
            ("cash", collateral.cash),
            ("securities", collateral.securities),
            ("commodities", collateral.commodities),
        ] {
            if amount < 0.0 || !amount.is_finite() {
                return Err(MarginError::Validation {
                    field: field.to_string(),
                    reason: format!("must be a non-negative amount, got {}", amount),
                });
            }
        }
        // Region must exist before we create an account keyed on it
        self.regions.get(region)?;

        self.accounts
            .replace_collateral(account_id, region, collateral)
            .await?;

        info!(account = %account_id, region, "collateral updated");
        self.check_margin_requirements(account_id, region).await
    }

    /// Mark non-immediate calls past their due time as expired. Run by a
    /// periodic sweep; immediate calls resolve via auto-liquidation.
    pub async fn expire_overdue_calls(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> MarginResult<usize> {
        let calls = self.accounts.list_calls(account_id, region).await?;
        let now = Utc::now();
        let mut expired = 0;

        for call in calls {
            if call.status == MarginCallStatus::Issued
                && call.call_type == MarginCallType::EndOfDay
                && call.due_at < now
                && self
                    .accounts
                    .resolve_call(account_id, region, call.call_id, MarginCallStatus::Expired)
                    .await?
            {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Sweep every known account for overdue calls
    pub async fn sweep_expired_calls(&self) -> usize {
        let keys = match self.accounts.account_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "could not list accounts for expiry sweep");
                return 0;
            }
        };

        let mut total = 0;
        for (account_id, region) in keys {
            match self.expire_overdue_calls(account_id, &region).await {
                Ok(0) => {}
                Ok(n) => {
                    info!(account = %account_id, %region, expired = n, "margin calls expired");
                    total += n;
                }
                Err(e) => {
                    warn!(account = %account_id, error = %e, "call expiry failed");
                }
            }
        }
        total
    }

    /// Run the expiry sweep on a fixed interval until shutdown flips
    pub async fn run_call_expiry(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut timer = tokio::time::interval(interval);
        // The first tick fires immediately; skip it
        timer.tick().await;

        info!(interval_secs = interval.as_secs(), "margin call expiry sweep started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep_expired_calls().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("margin call expiry sweep stopped");
                        return;
                    }
                }
            }
        }
    }

    async fn cure_open_calls(
        &self,
        calls: &[MarginCall],
        account_id: Uuid,
        region: &str,
    ) -> MarginResult<()> {
        for call in calls.iter().filter(|c| c.status == MarginCallStatus::Issued) {
            if self
                .accounts
                .resolve_call(account_id, region, call.call_id, MarginCallStatus::Satisfied)
                .await?
            {
                info!(call = %call.call_id, account = %account_id, "margin call satisfied");
                if let Some(token) = self.liquidation_tokens.lock().await.remove(&call.call_id) {
                    token.cancel();
                }
            }
        }
        Ok(())
    }

    async fn issue_call_if_needed(
        &self,
        existing: &[MarginCall],
        account_id: Uuid,
        region: &str,
        deficit: f64,
    ) -> MarginResult<()> {
        if existing.iter().any(|c| c.status == MarginCallStatus::Issued) {
            debug!(account = %account_id, "open margin call already exists, not re-issuing");
            return Ok(());
        }

        let config = self.regions.get(region)?;
        let call = calls::build_call(
            account_id,
            region,
            deficit,
            &config.margin_rules,
            config.settlement_rules.cutoff,
        );

        warn!(
            account = %account_id,
            region,
            deficit,
            call_type = ?call.call_type,
            due_at = %call.due_at,
            "margin call issued"
        );
        metrics::counter!("margin_calls_issued_total", "region" => region.to_string())
            .increment(1);

        self.accounts.append_call(call.clone()).await?;

        // Notification is outbox-backed: channel outages never fail the call
        self.outbox
            .enqueue(Notification::new(
                NotificationTopic::MarginCall,
                account_id,
                format!("Margin call: {:.2} {}", deficit, config.currency),
                format!(
                    "Post additional collateral of {:.2} by {} ({:?})",
                    deficit, call.due_at, call.call_type
                ),
            ))
            .await;

        if call.call_type == MarginCallType::Immediate {
            self.schedule_auto_liquidation(call).await;
        }

        Ok(())
    }

    /// One-shot fail-safe: if the call is still open at its due time,
    /// liquidate `deficit x 1.2`. Fired at most once per call; cancelled
    /// if the deficit is cured first.
    async fn schedule_auto_liquidation(&self, call: MarginCall) {
        let token = CancellationToken::new();
        self.liquidation_tokens
            .lock()
            .await
            .insert(call.call_id, token.clone());

        let accounts = Arc::clone(&self.accounts);
        let outbox = Arc::clone(&self.outbox);
        let tokens = Arc::clone(&self.liquidation_tokens);

        tokio::spawn(async move {
            let wait = (call.due_at - Utc::now())
                .to_std()
                .unwrap_or_default();

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(call = %call.call_id, "auto-liquidation cancelled, deficit cured");
                }
                _ = tokio::time::sleep(wait) => {
                    let fired = accounts
                        .resolve_call(
                            call.account_id,
                            &call.region,
                            call.call_id,
                            MarginCallStatus::AutoLiquidated,
                        )
                        .await;

                    match fired {
                        Ok(true) => {
                            let amount = call.liquidation_amount.unwrap_or(call.deficit);
                            warn!(
                                call = %call.call_id,
                                account = %call.account_id,
                                amount,
                                "margin call unmet, auto-liquidation fired"
                            );
                            metrics::counter!("margin_auto_liquidations_total").increment(1);
                            outbox
                                .enqueue(Notification::new(
                                    NotificationTopic::AutoLiquidation,
                                    call.account_id,
                                    "Positions liquidated",
                                    format!("Auto-liquidated {:.2} to cover unmet margin call", amount),
                                ))
                                .await;
                        }
                        Ok(false) => {
                            debug!(call = %call.call_id, "call already resolved, liquidation skipped");
                        }
                        Err(e) => {
                            warn!(call = %call.call_id, error = %e, "auto-liquidation failed");
                        }
                    }
                }
            }
            tokens.lock().await.remove(&call.call_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMarginStore;
    use assert_matches::assert_matches;
    use common::types::{AssetClass, Direction};
    use config::{generate_default_config, CollateralCatalog, RegionRegistry};
    use std::sync::RwLock as StdRwLock;

    /// Position source returning a fixed set of exposures
    struct StaticPositionSource {
        exposures: StdRwLock<Vec<ContractExposure>>,
    }

    impl StaticPositionSource {
        fn new(exposures: Vec<ContractExposure>) -> Arc<Self> {
            Arc::new(Self {
                exposures: StdRwLock::new(exposures),
            })
        }
    }

    #[async_trait]
    impl PositionSource for StaticPositionSource {
        async fn active_exposures(
            &self,
            _account_id: Uuid,
            _region: &str,
        ) -> common::Result<Vec<ContractExposure>> {
            Ok(self.exposures.read().unwrap().clone())
        }
    }

    fn future_exposure(notional: f64) -> ContractExposure {
        ContractExposure {
            contract_id: Uuid::new_v4(),
            commodity: "WTI".to_string(),
            asset_class: AssetClass::Future,
            notional,
            direction: Direction::Long,
            option_premium: None,
            option_delta: None,
        }
    }

    fn build_service(exposures: Vec<ContractExposure>) -> Arc<MarginService> {
        let config = generate_default_config();
        MarginService::new(
            Arc::new(InMemoryMarginStore::new()),
            StaticPositionSource::new(exposures),
            Arc::new(RegionRegistry::from_config(&config)),
            Arc::new(CollateralCatalog::from_config(&config)),
            Outbox::new(),
        )
    }

    #[tokio::test]
    async fn test_adequate_collateral() {
        let service = build_service(vec![future_exposure(1_000_000.0)]);
        let account_id = Uuid::new_v4();

        // US initial rate 10%: required 100k; post 200k cash
        let check = service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    cash: 200_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        assert_matches!(check.status, MarginCheckStatus::Adequate { surplus } if surplus > 0.0);
        assert_eq!(check.required_initial, 100_000.0);
    }

    #[tokio::test]
    async fn test_securities_haircut_applied() {
        let service = build_service(vec![future_exposure(1_000_000.0)]);
        let account_id = Uuid::new_v4();

        // 100k securities at 15% haircut values at 85k, below the 100k requirement
        let check = service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    securities: 100_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        assert_eq!(check.collateral_value, 85_000.0);
        assert_matches!(check.status, MarginCheckStatus::MarginCall { .. });
    }

    #[tokio::test]
    async fn test_commodities_excluded_from_coverage() {
        let service = build_service(vec![future_exposure(1_000_000.0)]);
        let account_id = Uuid::new_v4();

        let check = service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    commodities: 1_000_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        assert_eq!(check.collateral_value, 0.0);
    }

    #[tokio::test]
    async fn test_deficit_issues_margin_call() {
        let service = build_service(vec![future_exposure(1_000_000.0)]);
        let account_id = Uuid::new_v4();

        let check = service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    cash: 50_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        assert_matches!(check.status, MarginCheckStatus::MarginCall { deficit } if deficit == 50_000.0);

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, MarginCallStatus::Issued);
        assert_eq!(calls[0].call_type, MarginCallType::EndOfDay);
        assert!(calls[0].due_at >= calls[0].issued_at);
    }

    #[tokio::test]
    async fn test_repeated_checks_do_not_duplicate_calls() {
        let service = build_service(vec![future_exposure(1_000_000.0)]);
        let account_id = Uuid::new_v4();

        service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    cash: 50_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();
        service.check_margin_requirements(account_id, "US").await.unwrap();
        service.check_margin_requirements(account_id, "US").await.unwrap();

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_large_deficit_due_within_two_hours() {
        // 20M notional at 10% requires 2M; no collateral: deficit 2M
        let service = build_service(vec![future_exposure(20_000_000.0)]);
        let account_id = Uuid::new_v4();

        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].call_type, MarginCallType::Immediate);
        assert!(calls[0].due_at - calls[0].issued_at <= chrono::Duration::hours(2));
        assert_eq!(calls[0].liquidation_amount, Some(2_000_000.0 * 1.2));
    }

    #[tokio::test]
    async fn test_posting_collateral_cures_call() {
        let service = build_service(vec![future_exposure(1_000_000.0)]);
        let account_id = Uuid::new_v4();

        service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    cash: 50_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        let check = service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    cash: 150_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        assert_matches!(check.status, MarginCheckStatus::Adequate { .. });
        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].status, MarginCallStatus::Satisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_liquidation_fires_once_at_due_time() {
        let service = build_service(vec![future_exposure(20_000_000.0)]);
        let account_id = Uuid::new_v4();

        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();

        // Advance past the 2h grace window; paused time lets the
        // liquidation timer fire deterministically
        tokio::time::sleep(std::time::Duration::from_secs(3 * 3600)).await;

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, MarginCallStatus::AutoLiquidated);
    }

    fn overdue_call(account_id: Uuid, call_type: MarginCallType) -> MarginCall {
        MarginCall {
            call_id: Uuid::new_v4(),
            account_id,
            region: "US".to_string(),
            call_type,
            deficit: 50_000.0,
            liquidation_amount: None,
            status: MarginCallStatus::Issued,
            issued_at: Utc::now() - chrono::Duration::days(1),
            due_at: Utc::now() - chrono::Duration::hours(1),
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn test_overdue_end_of_day_call_expires() {
        let service = build_service(vec![]);
        let account_id = Uuid::new_v4();
        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();
        service
            .accounts
            .append_call(overdue_call(account_id, MarginCallType::EndOfDay))
            .await
            .unwrap();

        assert_eq!(service.expire_overdue_calls(account_id, "US").await.unwrap(), 1);
        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].status, MarginCallStatus::Expired);

        // A second sweep finds nothing left to expire
        assert_eq!(service.expire_overdue_calls(account_id, "US").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_immediate_calls_left_to_liquidation_timer() {
        let service = build_service(vec![]);
        let account_id = Uuid::new_v4();
        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();
        service
            .accounts
            .append_call(overdue_call(account_id, MarginCallType::Immediate))
            .await
            .unwrap();

        assert_eq!(service.expire_overdue_calls(account_id, "US").await.unwrap(), 0);
        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].status, MarginCallStatus::Issued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sweep_runs_until_shutdown() {
        let service = build_service(vec![]);
        let account_id = Uuid::new_v4();
        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();
        service
            .accounts
            .append_call(overdue_call(account_id, MarginCallType::EndOfDay))
            .await
            .unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle =
            tokio::spawn(Arc::clone(&service).run_call_expiry(Duration::from_secs(60), stop_rx));

        tokio::time::sleep(Duration::from_secs(90)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].status, MarginCallStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_liquidation_releases_token() {
        let service = build_service(vec![future_exposure(20_000_000.0)]);
        let account_id = Uuid::new_v4();

        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();
        assert!(!service.liquidation_tokens.lock().await.is_empty());

        tokio::time::sleep(std::time::Duration::from_secs(3 * 3600)).await;

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].status, MarginCallStatus::AutoLiquidated);
        assert!(service.liquidation_tokens.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_curing_cancels_auto_liquidation() {
        let service = build_service(vec![future_exposure(20_000_000.0)]);
        let account_id = Uuid::new_v4();

        service
            .update_user_collateral(account_id, CollateralBalances::default(), "US")
            .await
            .unwrap();

        // Cure well before the due time
        service
            .update_user_collateral(
                account_id,
                CollateralBalances {
                    cash: 3_000_000.0,
                    ..Default::default()
                },
                "US",
            )
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3 * 3600)).await;

        let calls = service.accounts.list_calls(account_id, "US").await.unwrap();
        assert_eq!(calls[0].status, MarginCallStatus::Satisfied);
    }

    #[tokio::test]
    async fn test_margin_call_notification_queued() {
        let config = generate_default_config();
        let outbox = Outbox::new();
        let service = MarginService::new(
            Arc::new(InMemoryMarginStore::new()),
            StaticPositionSource::new(vec![future_exposure(1_000_000.0)]),
            Arc::new(RegionRegistry::from_config(&config)),
            Arc::new(CollateralCatalog::from_config(&config)),
            Arc::clone(&outbox),
        );

        service
            .update_user_collateral(Uuid::new_v4(), CollateralBalances::default(), "US")
            .await
            .unwrap();

        assert_eq!(outbox.pending().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_region_is_insufficient_data() {
        let service = build_service(vec![]);
        let result = service
            .check_margin_requirements(Uuid::new_v4(), "MARS")
            .await;
        assert_matches!(result, Err(MarginError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_unknown_account_is_insufficient_data() {
        let service = build_service(vec![]);
        let result = service.check_margin_requirements(Uuid::new_v4(), "US").await;
        assert_matches!(result, Err(MarginError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn test_negative_collateral_rejected() {
        let service = build_service(vec![]);
        let result = service
            .update_user_collateral(
                Uuid::new_v4(),
                CollateralBalances {
                    cash: -1.0,
                    ..Default::default()
                },
                "US",
            )
            .await;
        assert_matches!(result, Err(MarginError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_portfolio_margin_projection() {
        let service = build_service(vec![
            future_exposure(1_000_000.0),
            ContractExposure {
                direction: Direction::Short,
                ..future_exposure(800_000.0)
            },
        ]);

        let portfolio = service
            .portfolio_margin(Uuid::new_v4(), "US")
            .await
            .unwrap();

        assert_eq!(portfolio.position_count, 2);
        assert!(portfolio.total_initial_margin <= portfolio.gross_initial_margin);
        assert!(portfolio.netting_adjustment > 0.0);
    }
}
