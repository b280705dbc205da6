//! Ledger view providers
//!
//! Each provider answers with its own record of an account. The internal
//! view reads the engine's margin and position state; the external ones
//! (clearing house, custodian, counterparty) are connectivity seams, with
//! a static stand-in for tests and simulation.

use crate::error::{ReconciliationError, ReconciliationResult};
use crate::types::LedgerSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use margin::{MarginAccountStore, PositionSource};
use settlement::{InstructionStore, SettlementStatus};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait LedgerViewProvider: Send + Sync {
    fn source_name(&self) -> &str;

    async fn snapshot(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> ReconciliationResult<LedgerSnapshot>;
}

/// The engine's own books: active positions via the position source, cash
/// and margin from the margin account store. Completed settlements move
/// cash, so their signed amounts fold into the cash balance.
pub struct InternalLedgerView {
    positions: Arc<dyn PositionSource>,
    accounts: Arc<dyn MarginAccountStore>,
    settlements: Arc<dyn InstructionStore>,
}

impl InternalLedgerView {
    pub fn new(
        positions: Arc<dyn PositionSource>,
        accounts: Arc<dyn MarginAccountStore>,
        settlements: Arc<dyn InstructionStore>,
    ) -> Self {
        Self {
            positions,
            accounts,
            settlements,
        }
    }
}

#[async_trait]
impl LedgerViewProvider for InternalLedgerView {
    fn source_name(&self) -> &str {
        "internal"
    }

    async fn snapshot(
        &self,
        account_id: Uuid,
        region: &str,
    ) -> ReconciliationResult<LedgerSnapshot> {
        let exposures = self
            .positions
            .active_exposures(account_id, region)
            .await
            .map_err(|e| {
                ReconciliationError::SourceUnavailable("internal".to_string(), e.to_string())
            })?;
        let account = self.accounts.get(account_id, region).await?;

        let (cash, margin) = account
            .map(|a| {
                let posted = a.collateral.cash + a.collateral.securities + a.collateral.commodities;
                (a.collateral.cash, posted - a.collateral.cash)
            })
            .unwrap_or((0.0, 0.0));

        let settled_cash: f64 = self
            .settlements
            .list_for_user(account_id)
            .await?
            .iter()
            .filter(|i| i.region == region && i.status == SettlementStatus::Completed)
            .map(|i| i.amount)
            .sum();

        Ok(LedgerSnapshot {
            source: "internal".to_string(),
            position_count: exposures.len() as u64,
            cash_balance: cash + settled_cash,
            margin_balance: margin,
            as_of: Utc::now(),
        })
    }
}

/// Fixed-response provider standing in for an external ledger feed.
/// Snapshots are settable per account so tests can stage disagreements.
pub struct StaticLedgerView {
    name: String,
    snapshots: RwLock<std::collections::HashMap<Uuid, LedgerSnapshot>>,
    available: RwLock<bool>,
}

impl StaticLedgerView {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            snapshots: RwLock::new(std::collections::HashMap::new()),
            available: RwLock::new(true),
        })
    }

    pub async fn set_view(
        &self,
        account_id: Uuid,
        position_count: u64,
        cash_balance: f64,
        margin_balance: f64,
    ) {
        self.snapshots.write().await.insert(
            account_id,
            LedgerSnapshot {
                source: self.name.clone(),
                position_count,
                cash_balance,
                margin_balance,
                as_of: Utc::now(),
            },
        );
    }

    pub async fn set_available(&self, available: bool) {
        *self.available.write().await = available;
    }
}

#[async_trait]
impl LedgerViewProvider for StaticLedgerView {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn snapshot(
        &self,
        account_id: Uuid,
        _region: &str,
    ) -> ReconciliationResult<LedgerSnapshot> {
        if !*self.available.read().await {
            return Err(ReconciliationError::SourceUnavailable(
                self.name.clone(),
                "feed down".to_string(),
            ));
        }
        self.snapshots
            .read()
            .await
            .get(&account_id)
            .cloned()
            .ok_or_else(|| {
                ReconciliationError::SourceUnavailable(
                    self.name.clone(),
                    format!("no view for account {}", account_id),
                )
            })
    }
}
