//! Settlement instruction model

use chrono::{DateTime, Utc};
use common::types::SettlementType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl SettlementStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

/// One named step in a settlement workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Clearing submission attempts, including retries
    pub attempts: u32,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            attempts: 0,
        }
    }
}

/// Ordered workflow. Steps execute strictly in sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn new(step_names: &[&str]) -> Self {
        Self {
            steps: step_names.iter().map(|s| WorkflowStep::new(*s)).collect(),
        }
    }

    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// Index of the first step that has not completed
    pub fn next_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.status != StepStatus::Completed)
    }
}

/// Physical-delivery details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryInstructions {
    pub location: String,
    pub quantity: f64,
    pub quality_spec: Option<String>,
}

/// Fee and margin obligations computed at instruction creation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obligations {
    pub notional: f64,
    pub clearing_fee: f64,
    pub settlement_fee: f64,
    pub regulatory_fee: f64,
    pub required_margin: f64,
}

impl Obligations {
    pub fn total_fees(&self) -> f64 {
        self.clearing_fee + self.settlement_fee + self.regulatory_fee
    }
}

/// Margin posture recorded at creation. Insufficiency is recorded, not
/// blocking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MarginStatus {
    Adequate,
    Insufficient { deficit: f64 },
    Unchecked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub instruction_id: Uuid,
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub settlement_type: SettlementType,
    /// Signed: positive receives, negative pays
    pub amount: f64,
    pub currency: String,
    pub region: String,
    pub delivery_instructions: Option<DeliveryInstructions>,
    pub status: SettlementStatus,
    pub obligations: Obligations,
    pub margin_status: MarginStatus,
    /// Routed clearing network; None while no healthy network matches
    pub network_id: Option<String>,
    pub workflow: Workflow,
    pub auto_settle: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_next_step_order() {
        let mut workflow = Workflow::new(&["a", "b", "c"]);
        assert_eq!(workflow.next_step(), Some(0));

        workflow.steps[0].status = StepStatus::Completed;
        assert_eq!(workflow.next_step(), Some(1));

        for step in &mut workflow.steps {
            step.status = StepStatus::Completed;
        }
        assert!(workflow.all_completed());
        assert_eq!(workflow.next_step(), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SettlementStatus::Pending.is_terminal());
        assert!(!SettlementStatus::InProgress.is_terminal());
        assert!(SettlementStatus::Completed.is_terminal());
        assert!(SettlementStatus::Cancelled.is_terminal());
        assert!(SettlementStatus::Failed.is_terminal());
    }

    #[test]
    fn test_total_fees() {
        let obligations = Obligations {
            notional: 1_000_000.0,
            clearing_fee: 100.0,
            settlement_fee: 50.0,
            regulatory_fee: 25.0,
            required_margin: 100_000.0,
        };
        assert_eq!(obligations.total_fees(), 175.0);
    }
}
