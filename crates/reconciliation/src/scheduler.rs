//! Recurring reconciliation
//!
//! A background task that sweeps the registered accounts on a fixed
//! cadence. A failed run for one account (source outage) is logged and
//! does not stop the sweep or the schedule.

use crate::engine::ReconciliationEngine;
use crate::types::ReconciliationType;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

pub struct ReconciliationScheduler {
    engine: Arc<ReconciliationEngine>,
    accounts: RwLock<Vec<(Uuid, String)>>,
    recon_type: ReconciliationType,
}

impl ReconciliationScheduler {
    pub fn new(engine: Arc<ReconciliationEngine>, recon_type: ReconciliationType) -> Arc<Self> {
        Arc::new(Self {
            engine,
            accounts: RwLock::new(Vec::new()),
            recon_type,
        })
    }

    /// Register an account/region pair for the recurring sweep
    pub async fn watch_account(&self, account_id: Uuid, region: impl Into<String>) {
        let mut accounts = self.accounts.write().await;
        let region = region.into();
        if !accounts.iter().any(|(id, r)| *id == account_id && *r == region) {
            accounts.push((account_id, region));
        }
    }

    pub async fn sweep_once(&self) -> usize {
        let accounts = self.accounts.read().await.clone();
        let mut completed = 0;
        for (account_id, region) in accounts {
            match self
                .engine
                .perform_reconciliation(account_id, &region, self.recon_type)
                .await
            {
                Ok(record) => {
                    completed += 1;
                    if !record.is_clean() {
                        info!(
                            account = %account_id,
                            breaks = record.breaks.len(),
                            "scheduled reconciliation found breaks"
                        );
                    }
                }
                Err(e) => {
                    warn!(account = %account_id, error = %e, "scheduled reconciliation failed");
                }
            }
        }
        completed
    }

    /// Run the sweep on a fixed interval until shutdown flips
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut timer = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the engine settles
        timer.tick().await;

        info!(interval_secs = interval.as_secs(), "reconciliation schedule started");
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reconciliation schedule stopped");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{LedgerViewProvider, StaticLedgerView};
    use crate::store::InMemoryRecordStore;
    use common::outbox::Outbox;

    async fn staged_engine(account: Uuid) -> Arc<ReconciliationEngine> {
        let internal = StaticLedgerView::new("internal");
        let clearing = StaticLedgerView::new("clearing_house");
        for view in [&internal, &clearing] {
            view.set_view(account, 2, 50_000.0, 10_000.0).await;
        }
        ReconciliationEngine::new(
            internal as Arc<dyn LedgerViewProvider>,
            vec![clearing as Arc<dyn LedgerViewProvider>],
            InMemoryRecordStore::new(),
            Outbox::new(),
        )
    }

    #[tokio::test]
    async fn test_sweep_covers_watched_accounts() {
        let account = Uuid::new_v4();
        let engine = staged_engine(account).await;
        let scheduler = ReconciliationScheduler::new(Arc::clone(&engine), ReconciliationType::Daily);

        scheduler.watch_account(account, "US").await;
        scheduler.watch_account(account, "US").await; // registered once

        assert_eq!(scheduler.sweep_once().await, 1);
        assert_eq!(engine.history(account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_account_does_not_stop_sweep() {
        let staged = Uuid::new_v4();
        let engine = staged_engine(staged).await;
        let scheduler = ReconciliationScheduler::new(Arc::clone(&engine), ReconciliationType::Daily);

        // No views exist for this account, so its run fails
        scheduler.watch_account(Uuid::new_v4(), "US").await;
        scheduler.watch_account(staged, "US").await;

        assert_eq!(scheduler.sweep_once().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_runs_until_shutdown() {
        let account = Uuid::new_v4();
        let engine = staged_engine(account).await;
        let scheduler = ReconciliationScheduler::new(Arc::clone(&engine), ReconciliationType::Daily);
        scheduler.watch_account(account, "US").await;

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&scheduler).run(Duration::from_secs(60), stop_rx));

        tokio::time::sleep(Duration::from_secs(150)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        // Two interval ticks elapsed
        assert_eq!(engine.history(account).await.unwrap().len(), 2);
    }
}
