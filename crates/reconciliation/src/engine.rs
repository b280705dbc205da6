//! Break detection, severity scoring, and auto-resolution

use crate::error::ReconciliationResult;
use crate::sources::LedgerViewProvider;
use crate::store::RecordStore;
use crate::types::{
    BreakCategory, BreakSeverity, LedgerSnapshot, ReconciliationBreak, ReconciliationRecord,
    ReconciliationType, Resolution,
};
use chrono::Utc;
use common::outbox::{Notification, NotificationTopic, Outbox};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Balances within a cent are considered matched
const CASH_TOLERANCE: f64 = 0.01;

/// Value impact below this auto-resolves a single-source break
const LOW_IMPACT_CEILING: f64 = 10_000.0;

/// Value impact at or above this is always a high-severity break
const HIGH_IMPACT_FLOOR: f64 = 1_000_000.0;

pub struct ReconciliationEngine {
    internal: Arc<dyn LedgerViewProvider>,
    externals: Vec<Arc<dyn LedgerViewProvider>>,
    records: Arc<dyn RecordStore>,
    outbox: Arc<Outbox>,
}

impl ReconciliationEngine {
    pub fn new(
        internal: Arc<dyn LedgerViewProvider>,
        externals: Vec<Arc<dyn LedgerViewProvider>>,
        records: Arc<dyn RecordStore>,
        outbox: Arc<Outbox>,
    ) -> Arc<Self> {
        Arc::new(Self {
            internal,
            externals,
            records,
            outbox,
        })
    }

    /// Gather all views, compare categories pairwise against the internal
    /// books, score and auto-resolve breaks, and append the immutable
    /// record. Trading state is never touched.
    pub async fn perform_reconciliation(
        &self,
        account_id: Uuid,
        region: &str,
        recon_type: ReconciliationType,
    ) -> ReconciliationResult<ReconciliationRecord> {
        let internal = self.internal.snapshot(account_id, region).await?;

        let mut snapshots = vec![internal.clone()];
        for provider in &self.externals {
            let snapshot = provider.snapshot(account_id, region).await?;
            snapshots.push(snapshot);
        }

        let mut breaks = detect_breaks(&internal, &snapshots[1..]);
        let resolution = attempt_auto_resolution(&mut breaks);

        let record = ReconciliationRecord {
            record_id: Uuid::new_v4(),
            account_id,
            region: region.to_string(),
            recon_type,
            snapshots,
            breaks,
            resolution,
            run_at: Utc::now(),
        };

        metrics::counter!("reconciliation_runs_total").increment(1);
        if !record.is_clean() {
            metrics::counter!("reconciliation_breaks_total")
                .increment(record.breaks.len() as u64);
        }

        let open = record.open_breaks().count();
        if open > 0 {
            warn!(
                account = %account_id,
                region,
                breaks = record.breaks.len(),
                open,
                "reconciliation found unresolved breaks"
            );
            self.outbox
                .enqueue(Notification::new(
                    NotificationTopic::ReconciliationReport,
                    account_id,
                    format!("{} reconciliation breaks require sign-off", open),
                    record
                        .open_breaks()
                        .map(|b| b.description.clone())
                        .collect::<Vec<_>>()
                        .join("; "),
                ))
                .await;
        } else {
            info!(
                account = %account_id,
                region,
                auto_resolved = record.resolution.auto_resolved,
                "reconciliation clean"
            );
        }

        self.records.append(record.clone()).await?;
        Ok(record)
    }

    pub async fn history(&self, account_id: Uuid) -> ReconciliationResult<Vec<ReconciliationRecord>> {
        Ok(self.records.list_for_account(account_id).await?)
    }
}

/// Exact-match comparison of each external view against the internal one.
/// One break per mismatched category, counting the disagreeing sources
/// and the worst value difference.
fn detect_breaks(internal: &LedgerSnapshot, externals: &[LedgerSnapshot]) -> Vec<ReconciliationBreak> {
    let mut breaks = Vec::new();

    let position_mismatches: Vec<&LedgerSnapshot> = externals
        .iter()
        .filter(|s| s.position_count != internal.position_count)
        .collect();
    if !position_mismatches.is_empty() {
        let impact = position_mismatches
            .iter()
            .map(|s| (s.position_count as f64 - internal.position_count as f64).abs())
            .fold(0.0, f64::max);
        breaks.push(score_break(
            BreakCategory::Position,
            &position_mismatches,
            impact,
            format!(
                "position count {} disagrees with: {}",
                internal.position_count,
                describe(&position_mismatches, |s| s.position_count.to_string())
            ),
        ));
    }

    let cash_mismatches: Vec<&LedgerSnapshot> = externals
        .iter()
        .filter(|s| (s.cash_balance - internal.cash_balance).abs() > CASH_TOLERANCE)
        .collect();
    if !cash_mismatches.is_empty() {
        let impact = cash_mismatches
            .iter()
            .map(|s| (s.cash_balance - internal.cash_balance).abs())
            .fold(0.0, f64::max);
        breaks.push(score_break(
            BreakCategory::Cash,
            &cash_mismatches,
            impact,
            format!(
                "cash balance {:.2} disagrees with: {}",
                internal.cash_balance,
                describe(&cash_mismatches, |s| format!("{:.2}", s.cash_balance))
            ),
        ));
    }

    let margin_mismatches: Vec<&LedgerSnapshot> = externals
        .iter()
        .filter(|s| (s.margin_balance - internal.margin_balance).abs() > CASH_TOLERANCE)
        .collect();
    if !margin_mismatches.is_empty() {
        let impact = margin_mismatches
            .iter()
            .map(|s| (s.margin_balance - internal.margin_balance).abs())
            .fold(0.0, f64::max);
        breaks.push(score_break(
            BreakCategory::Margin,
            &margin_mismatches,
            impact,
            format!(
                "margin balance {:.2} disagrees with: {}",
                internal.margin_balance,
                describe(&margin_mismatches, |s| format!("{:.2}", s.margin_balance))
            ),
        ));
    }

    breaks
}

fn describe(sources: &[&LedgerSnapshot], value: impl Fn(&LedgerSnapshot) -> String) -> String {
    sources
        .iter()
        .map(|s| format!("{}={}", s.source, value(s)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn score_break(
    category: BreakCategory,
    mismatches: &[&LedgerSnapshot],
    value_impact: f64,
    description: String,
) -> ReconciliationBreak {
    let count = mismatches.len() as u32;
    let severity = if value_impact >= HIGH_IMPACT_FLOOR {
        BreakSeverity::High
    } else if count == 1 && value_impact < LOW_IMPACT_CEILING {
        BreakSeverity::Low
    } else {
        BreakSeverity::Medium
    };

    debug!(?category, ?severity, count, value_impact, "break detected");
    ReconciliationBreak {
        category,
        severity,
        count,
        value_impact,
        description,
        auto_resolved: false,
    }
}

/// Resolve only low-severity single-source breaks; everything else is
/// routed for sign-off with a suggested action.
fn attempt_auto_resolution(breaks: &mut [ReconciliationBreak]) -> Resolution {
    let mut auto_resolved = 0;
    let mut manual_required = 0;
    let mut suggested_actions = Vec::new();

    for b in breaks.iter_mut() {
        if b.severity == BreakSeverity::Low && b.count == 1 {
            b.auto_resolved = true;
            auto_resolved += 1;
        } else {
            manual_required += 1;
            suggested_actions.push(match b.category {
                BreakCategory::Position => {
                    format!("request trade-by-trade position report ({})", b.description)
                }
                BreakCategory::Cash => {
                    format!("pull statement and trace cash movements ({})", b.description)
                }
                BreakCategory::Margin => {
                    format!("recompute margin and confirm posted collateral ({})", b.description)
                }
            });
        }
    }

    Resolution {
        auto_resolved,
        manual_required,
        suggested_actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticLedgerView;
    use crate::store::InMemoryRecordStore;
    use assert_matches::assert_matches;
    use crate::error::ReconciliationError;

    struct Fixture {
        engine: Arc<ReconciliationEngine>,
        internal: Arc<StaticLedgerView>,
        clearing: Arc<StaticLedgerView>,
        custodian: Arc<StaticLedgerView>,
        counterparty: Arc<StaticLedgerView>,
        outbox: Arc<Outbox>,
    }

    fn fixture() -> Fixture {
        let internal = StaticLedgerView::new("internal");
        let clearing = StaticLedgerView::new("clearing_house");
        let custodian = StaticLedgerView::new("custodian");
        let counterparty = StaticLedgerView::new("counterparty");
        let outbox = Outbox::new();

        let engine = ReconciliationEngine::new(
            Arc::clone(&internal) as Arc<dyn LedgerViewProvider>,
            vec![
                Arc::clone(&clearing) as Arc<dyn LedgerViewProvider>,
                Arc::clone(&custodian) as Arc<dyn LedgerViewProvider>,
                Arc::clone(&counterparty) as Arc<dyn LedgerViewProvider>,
            ],
            InMemoryRecordStore::new(),
            Arc::clone(&outbox),
        );

        Fixture {
            engine,
            internal,
            clearing,
            custodian,
            counterparty,
            outbox,
        }
    }

    async fn stage_agreement(f: &Fixture, account: Uuid, positions: u64, cash: f64, margin: f64) {
        for view in [&f.internal, &f.clearing, &f.custodian, &f.counterparty] {
            view.set_view(account, positions, cash, margin).await;
        }
    }

    #[tokio::test]
    async fn test_clean_run_has_no_breaks() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 250_000.0, 100_000.0).await;

        let record = f
            .engine
            .perform_reconciliation(account, "US", ReconciliationType::Daily)
            .await
            .unwrap();

        assert!(record.is_clean());
        assert_eq!(record.snapshots.len(), 4);
        assert_eq!(f.outbox.pending().await, 0);
    }

    #[tokio::test]
    async fn test_single_position_mismatch_is_one_break() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 250_000.0, 100_000.0).await;
        // Clearing house sees one extra position
        f.clearing.set_view(account, 4, 250_000.0, 100_000.0).await;

        let record = f
            .engine
            .perform_reconciliation(account, "US", ReconciliationType::Daily)
            .await
            .unwrap();

        assert_eq!(record.breaks.len(), 1);
        let b = &record.breaks[0];
        assert_eq!(b.category, BreakCategory::Position);
        assert_eq!(b.count, 1);
        assert_eq!(b.severity, BreakSeverity::Low);
        assert!(b.auto_resolved);
        assert_eq!(record.resolution.auto_resolved, 1);
        assert_eq!(record.resolution.manual_required, 0);
    }

    #[tokio::test]
    async fn test_large_cash_mismatch_is_high_severity() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 2_000_000.0, 100_000.0).await;
        f.custodian.set_view(account, 3, 500_000.0, 100_000.0).await;

        let record = f
            .engine
            .perform_reconciliation(account, "US", ReconciliationType::Daily)
            .await
            .unwrap();

        let b = record
            .breaks
            .iter()
            .find(|b| b.category == BreakCategory::Cash)
            .unwrap();
        assert_eq!(b.severity, BreakSeverity::High);
        assert!(!b.auto_resolved);
        assert_eq!(record.resolution.manual_required, 1);
        assert!(!record.resolution.suggested_actions.is_empty());
        // Unresolved breaks notify for sign-off
        assert_eq!(f.outbox.pending().await, 1);
    }

    #[tokio::test]
    async fn test_multi_source_mismatch_is_medium() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 250_000.0, 100_000.0).await;
        f.clearing.set_view(account, 3, 250_100.0, 100_000.0).await;
        f.counterparty.set_view(account, 3, 249_900.0, 100_000.0).await;

        let record = f
            .engine
            .perform_reconciliation(account, "US", ReconciliationType::Weekly)
            .await
            .unwrap();

        let b = &record.breaks[0];
        assert_eq!(b.category, BreakCategory::Cash);
        assert_eq!(b.count, 2);
        assert_eq!(b.severity, BreakSeverity::Medium);
        assert!(!b.auto_resolved);
    }

    #[tokio::test]
    async fn test_breaks_detected_per_category() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 250_000.0, 100_000.0).await;
        f.clearing.set_view(account, 4, 251_000.0, 99_000.0).await;

        let record = f
            .engine
            .perform_reconciliation(account, "US", ReconciliationType::Monthly)
            .await
            .unwrap();

        let categories: Vec<BreakCategory> = record.breaks.iter().map(|b| b.category).collect();
        assert_eq!(
            categories,
            vec![BreakCategory::Position, BreakCategory::Cash, BreakCategory::Margin]
        );
    }

    #[tokio::test]
    async fn test_unavailable_source_fails_run() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 250_000.0, 100_000.0).await;
        f.custodian.set_available(false).await;

        assert_matches!(
            f.engine
                .perform_reconciliation(account, "US", ReconciliationType::Daily)
                .await,
            Err(ReconciliationError::SourceUnavailable(ref source, _)) if source == "custodian"
        );
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let f = fixture();
        let account = Uuid::new_v4();
        stage_agreement(&f, account, 3, 250_000.0, 100_000.0).await;

        f.engine
            .perform_reconciliation(account, "US", ReconciliationType::Daily)
            .await
            .unwrap();
        f.engine
            .perform_reconciliation(account, "US", ReconciliationType::Daily)
            .await
            .unwrap();

        let history = f.engine.history(account).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_ne!(history[0].record_id, history[1].record_id);
    }
}
