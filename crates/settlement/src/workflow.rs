//! Workflow construction and execution
//!
//! Steps execute strictly in order, one instruction per task. Each step is
//! a clearing submission with timeout, bounded retries, and backoff. The
//! cancellation token is checked at step boundaries only; a step that has
//! started runs to its outcome.

use crate::clearing::ClearingClient;
use crate::store::InstructionStore;
use crate::types::{SettlementStatus, StepStatus, Workflow};
use chrono::Utc;
use common::types::SettlementType;
use config::WorkflowConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const STEP_TRADE_VALIDATION: &str = "trade_validation";
pub const STEP_MARGIN_CHECK: &str = "margin_check";
pub const STEP_CLEARING_INSTRUCTION: &str = "clearing_instruction_generation";
pub const STEP_COUNTERPARTY_CONFIRMATION: &str = "counterparty_confirmation";
pub const STEP_DELIVERY_SCHEDULING: &str = "delivery_scheduling";
pub const STEP_QUALITY_INSPECTION: &str = "quality_inspection";
pub const STEP_SUBMISSION: &str = "settlement_instruction_submission";
pub const STEP_COMPLETION: &str = "settlement_completion";

/// Ordered step list for a settlement type. Physical settlements add
/// delivery scheduling and quality inspection.
pub fn build_workflow(settlement_type: SettlementType) -> Workflow {
    match settlement_type {
        SettlementType::Cash | SettlementType::NetCash => Workflow::new(&[
            STEP_TRADE_VALIDATION,
            STEP_MARGIN_CHECK,
            STEP_CLEARING_INSTRUCTION,
            STEP_COUNTERPARTY_CONFIRMATION,
            STEP_SUBMISSION,
            STEP_COMPLETION,
        ]),
        SettlementType::Physical => Workflow::new(&[
            STEP_TRADE_VALIDATION,
            STEP_MARGIN_CHECK,
            STEP_CLEARING_INSTRUCTION,
            STEP_COUNTERPARTY_CONFIRMATION,
            STEP_DELIVERY_SCHEDULING,
            STEP_QUALITY_INSPECTION,
            STEP_SUBMISSION,
            STEP_COMPLETION,
        ]),
    }
}

/// Drive one instruction's workflow to a terminal status. Runs inside its
/// own task; many instructions progress concurrently, but this function
/// never interleaves steps of a single instruction.
pub async fn execute(
    instruction_id: Uuid,
    store: Arc<dyn InstructionStore>,
    client: Arc<dyn ClearingClient>,
    config: WorkflowConfig,
    cancel: CancellationToken,
) {
    loop {
        let mut instruction = match store.get(instruction_id).await {
            Ok(Some(i)) => i,
            Ok(None) => {
                warn!(instruction = %instruction_id, "instruction vanished mid-workflow");
                return;
            }
            Err(e) => {
                warn!(instruction = %instruction_id, error = %e, "store read failed, workflow halted");
                return;
            }
        };

        if instruction.status.is_terminal() {
            return;
        }
        // Between-step cancellation point; the cancel path owns the
        // status transition
        if cancel.is_cancelled() {
            debug!(instruction = %instruction_id, "workflow stopped at step boundary");
            return;
        }

        let Some(index) = instruction.workflow.next_step() else {
            instruction.status = SettlementStatus::Completed;
            instruction.completed_at = Some(Utc::now());
            instruction.updated_at = Utc::now();
            info!(instruction = %instruction_id, "settlement completed");
            metrics::counter!("settlements_completed_total").increment(1);
            if let Err(e) = store.update(instruction).await {
                warn!(instruction = %instruction_id, error = %e, "failed to persist completion");
            }
            return;
        };

        let step_name = instruction.workflow.steps[index].name.clone();
        instruction.workflow.steps[index].status = StepStatus::InProgress;
        instruction.workflow.steps[index].started_at = Some(Utc::now());
        instruction.status = SettlementStatus::InProgress;
        instruction.updated_at = Utc::now();
        if let Err(e) = store.update(instruction).await {
            warn!(instruction = %instruction_id, error = %e, "failed to persist step start");
            return;
        }

        match run_step(instruction_id, &step_name, client.as_ref(), &config).await {
            Ok(attempts) => {
                let Ok(Some(mut instruction)) = store.get(instruction_id).await else {
                    return;
                };
                instruction.workflow.steps[index].status = StepStatus::Completed;
                instruction.workflow.steps[index].completed_at = Some(Utc::now());
                instruction.workflow.steps[index].attempts = attempts;
                instruction.updated_at = Utc::now();
                debug!(instruction = %instruction_id, step = %step_name, attempts, "step completed");
                if let Err(e) = store.update(instruction).await {
                    warn!(instruction = %instruction_id, error = %e, "failed to persist step completion");
                    return;
                }
            }
            Err(reason) => {
                let Ok(Some(mut instruction)) = store.get(instruction_id).await else {
                    return;
                };
                instruction.status = SettlementStatus::Failed;
                instruction.failure_reason = Some(reason.clone());
                instruction.updated_at = Utc::now();
                warn!(
                    instruction = %instruction_id,
                    step = %step_name,
                    reason = %reason,
                    "workflow failed"
                );
                metrics::counter!("settlements_failed_total").increment(1);
                if let Err(e) = store.update(instruction).await {
                    warn!(instruction = %instruction_id, error = %e, "failed to persist failure");
                }
                return;
            }
        }
    }
}

/// One step: submit to clearing with timeout, retrying with backoff up to
/// the configured bound. Returns attempts used, or the final failure
/// reason once retries are exhausted.
async fn run_step(
    instruction_id: Uuid,
    step_name: &str,
    client: &dyn ClearingClient,
    config: &WorkflowConfig,
) -> Result<u32, String> {
    let timeout = Duration::from_secs(config.step_timeout_secs);
    let backoff = Duration::from_millis(config.retry_backoff_ms);

    let mut last_error = String::new();
    for attempt in 1..=config.max_step_retries {
        match tokio::time::timeout(timeout, client.submit_step(instruction_id, step_name)).await {
            Ok(Ok(())) => return Ok(attempt),
            Ok(Err(e)) => {
                last_error = e.to_string();
            }
            Err(_) => {
                last_error = format!("step '{}' timed out after {:?}", step_name, timeout);
            }
        }
        debug!(
            instruction = %instruction_id,
            step = step_name,
            attempt,
            error = %last_error,
            "step attempt failed, backing off"
        );
        tokio::time::sleep(backoff * attempt).await;
    }

    Err(format!(
        "step '{}' exhausted {} attempts: {}",
        step_name, config.max_step_retries, last_error
    ))
}
