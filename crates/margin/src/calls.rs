//! Margin call classification and auto-liquidation scheduling
//!
//! Call lifecycle: `Issued -> Satisfied | AutoLiquidated | Expired`.
//! Deficits above the region's immediate threshold are due within the
//! grace window; smaller deficits are due at the end-of-day cutoff,
//! rolling to the next business day if the cutoff has passed. Immediate
//! calls carry a one-shot auto-liquidation fail-safe at `deficit x 1.2`.

use crate::types::{MarginCall, MarginCallType};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use config::MarginRules;
use uuid::Uuid;

/// Sizing factor for the liquidation fail-safe
pub const LIQUIDATION_BUFFER: f64 = 1.2;

/// Classify a deficit into a call type and due time
pub fn classify_deficit(
    deficit: f64,
    rules: &MarginRules,
    cutoff: NaiveTime,
    now: DateTime<Utc>,
) -> (MarginCallType, DateTime<Utc>) {
    if deficit > rules.immediate_call_threshold {
        (
            MarginCallType::Immediate,
            now + Duration::hours(rules.call_grace_hours as i64),
        )
    } else {
        (
            MarginCallType::EndOfDay,
            common::bizdate::end_of_day_deadline(now, cutoff),
        )
    }
}

/// Build a margin call for the given deficit
pub fn build_call(
    account_id: Uuid,
    region: &str,
    deficit: f64,
    rules: &MarginRules,
    cutoff: NaiveTime,
) -> MarginCall {
    let now = Utc::now();
    let (call_type, due_at) = classify_deficit(deficit, rules, cutoff, now);

    let liquidation_amount = match call_type {
        MarginCallType::Immediate => Some(deficit * LIQUIDATION_BUFFER),
        MarginCallType::EndOfDay => None,
    };

    MarginCall {
        call_id: Uuid::new_v4(),
        account_id,
        region: region.to_string(),
        call_type,
        deficit,
        liquidation_amount,
        status: crate::types::MarginCallStatus::Issued,
        issued_at: now,
        due_at,
        resolved_at: None,
    }
}
