//! Settlement Service - instruction lifecycle and batch netting

use crate::clearing::{ClearingClient, NetworkRegistry};
use crate::error::{SettlementError, SettlementResult};
use crate::netting::{self, NettingReport};
use crate::rules;
use crate::store::InstructionStore;
use crate::types::{
    DeliveryInstructions, MarginStatus, SettlementInstruction, SettlementStatus,
};
use crate::workflow;
use chrono::Utc;
use common::outbox::{Notification, NotificationTopic, Outbox};
use common::types::SettlementType;
use config::{RegionRegistry, WorkflowConfig};
use derivatives::{Contract, ContractStore};
use margin::{MarginCheckStatus, MarginError, MarginService};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request to settle a contract
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub contract_id: Uuid,
    pub settlement_type: SettlementType,
    /// Signed: positive receives, negative pays
    pub amount: f64,
    pub currency: String,
    pub region: String,
    pub delivery_instructions: Option<DeliveryInstructions>,
    /// Whether the workflow starts as soon as the instruction is created
    /// and routed. When unset, amounts at or below the region's
    /// auto-settle threshold start automatically.
    pub auto_settle: Option<bool>,
}

/// One leg of a multi-market settlement batch
#[derive(Debug, Clone)]
pub struct TradeLeg {
    pub contract_id: Uuid,
    pub settlement_type: SettlementType,
    pub amount: f64,
    pub currency: String,
    pub region: String,
}

pub struct SettlementService {
    store: Arc<dyn InstructionStore>,
    contracts: Arc<dyn ContractStore>,
    margin: Arc<MarginService>,
    networks: Arc<NetworkRegistry>,
    client: Arc<dyn ClearingClient>,
    regions: Arc<RegionRegistry>,
    outbox: Arc<Outbox>,
    workflow_config: WorkflowConfig,
    /// Cancellation handles for running workflows. Entries are removed on
    /// cancel and when the workflow task reaches a terminal status.
    cancel_tokens: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl SettlementService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn InstructionStore>,
        contracts: Arc<dyn ContractStore>,
        margin: Arc<MarginService>,
        networks: Arc<NetworkRegistry>,
        client: Arc<dyn ClearingClient>,
        regions: Arc<RegionRegistry>,
        outbox: Arc<Outbox>,
        workflow_config: WorkflowConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            contracts,
            margin,
            networks,
            client,
            regions,
            outbox,
            workflow_config,
            cancel_tokens: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn validate_request(&self, request: &SettlementRequest) -> SettlementResult<()> {
        if request.amount == 0.0 || !request.amount.is_finite() {
            return Err(SettlementError::validation(
                "amount",
                format!("must be a non-zero amount, got {}", request.amount),
            ));
        }
        if request.currency.trim().is_empty() {
            return Err(SettlementError::validation("currency", "must not be empty"));
        }
        if request.settlement_type == SettlementType::Physical
            && request.delivery_instructions.is_none()
        {
            return Err(SettlementError::validation(
                "delivery_instructions",
                "required for physical settlement",
            ));
        }

        let rules = self.regions.settlement_rules(&request.region)?;
        if !rules.supports(request.settlement_type) {
            return Err(SettlementError::validation(
                "settlement_type",
                format!(
                    "{} settlement is not offered in {}",
                    request.settlement_type, request.region
                ),
            ));
        }
        Ok(())
    }

    async fn load_active_contract(&self, contract_id: Uuid) -> SettlementResult<Contract> {
        let contract = self
            .contracts
            .get(contract_id)
            .await?
            .ok_or(SettlementError::ContractNotFound(contract_id))?;
        if !contract.is_active() {
            return Err(SettlementError::state_conflict(
                contract_id,
                "contract is not active",
            ));
        }
        Ok(contract)
    }

    /// Margin posture at creation. Insufficiency and missing margin data
    /// are recorded on the instruction, never blocking.
    async fn margin_posture(&self, user_id: Uuid, region: &str) -> MarginStatus {
        match self.margin.check_margin_requirements(user_id, region).await {
            Ok(check) => match check.status {
                MarginCheckStatus::Adequate { .. } => MarginStatus::Adequate,
                MarginCheckStatus::MarginCall { deficit } => {
                    MarginStatus::Insufficient { deficit }
                }
            },
            Err(MarginError::InsufficientData(reason)) => {
                debug!(user = %user_id, region, reason, "margin unchecked at settlement");
                MarginStatus::Unchecked
            }
            Err(e) => {
                warn!(user = %user_id, region, error = %e, "margin check failed at settlement");
                MarginStatus::Unchecked
            }
        }
    }

    /// Create an instruction in `pending` status. Routing failure leaves
    /// the instruction queued without a network; it is re-routed on
    /// execution. With `auto_settle`, a routed instruction starts its
    /// workflow immediately.
    pub async fn create_settlement_instruction(
        &self,
        request: SettlementRequest,
    ) -> SettlementResult<SettlementInstruction> {
        self.validate_request(&request)?;
        let contract = self.load_active_contract(request.contract_id).await?;

        let region_rules = self.regions.settlement_rules(&request.region)?;
        let auto_settle = request
            .auto_settle
            .unwrap_or(request.amount.abs() <= region_rules.auto_settle_threshold);

        let rule = rules::rule_for(contract.asset_class());
        let obligations = rule.obligations(request.amount, contract.margin_requirement);
        let margin_status = self.margin_posture(contract.user_id, &request.region).await;

        let network_id = match self.networks.route(
            contract.asset_class(),
            &request.currency,
            &request.region,
        ) {
            Ok(network) => Some(network.id.clone()),
            Err(SettlementError::NetworkUnavailable(scope)) => {
                warn!(
                    contract = %request.contract_id,
                    scope,
                    "no healthy clearing network, instruction queued unrouted"
                );
                None
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let instruction = SettlementInstruction {
            instruction_id: Uuid::new_v4(),
            contract_id: contract.contract_id,
            user_id: contract.user_id,
            settlement_type: request.settlement_type,
            amount: request.amount,
            currency: request.currency.clone(),
            region: request.region.clone(),
            delivery_instructions: request.delivery_instructions,
            status: SettlementStatus::Pending,
            obligations,
            margin_status,
            network_id,
            workflow: workflow::build_workflow(request.settlement_type),
            auto_settle,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancellation_reason: None,
            failure_reason: None,
        };

        self.store.insert(instruction.clone()).await?;
        info!(
            instruction = %instruction.instruction_id,
            contract = %instruction.contract_id,
            amount = instruction.amount,
            currency = %instruction.currency,
            network = instruction.network_id.as_deref().unwrap_or("unrouted"),
            "settlement instruction created"
        );

        if let MarginStatus::Insufficient { deficit } = instruction.margin_status {
            self.outbox
                .enqueue(Notification::new(
                    NotificationTopic::SettlementAlert,
                    instruction.user_id,
                    "Settlement created with insufficient margin",
                    format!(
                        "Instruction {} has a margin deficit of {:.2} {}",
                        instruction.instruction_id, deficit, instruction.currency
                    ),
                ))
                .await;
        }

        if instruction.auto_settle && instruction.network_id.is_some() {
            self.start_workflow(instruction.instruction_id).await;
        }

        Ok(instruction)
    }

    pub async fn get_instruction(
        &self,
        instruction_id: Uuid,
    ) -> SettlementResult<SettlementInstruction> {
        self.store
            .get(instruction_id)
            .await?
            .ok_or(SettlementError::InstructionNotFound(instruction_id))
    }

    /// Explicit trigger for instructions created with `auto_settle=false`,
    /// and the retry path for instructions queued unrouted.
    pub async fn execute_settlement(&self, instruction_id: Uuid) -> SettlementResult<()> {
        let mut instruction = self.get_instruction(instruction_id).await?;
        if instruction.status != SettlementStatus::Pending {
            return Err(SettlementError::state_conflict(
                instruction_id,
                format!("cannot execute from {:?}", instruction.status),
            ));
        }

        if instruction.network_id.is_none() {
            let contract = self.load_active_contract(instruction.contract_id).await?;
            let network = self.networks.route(
                contract.asset_class(),
                &instruction.currency,
                &instruction.region,
            )?;
            instruction.network_id = Some(network.id.clone());
            instruction.updated_at = Utc::now();
            self.store.update(instruction).await?;
        }

        self.start_workflow(instruction_id).await;
        Ok(())
    }

    async fn start_workflow(&self, instruction_id: Uuid) {
        let token = CancellationToken::new();
        self.cancel_tokens
            .lock()
            .await
            .insert(instruction_id, token.clone());

        metrics::counter!("settlements_started_total").increment(1);
        debug!(instruction = %instruction_id, "settlement workflow started");

        let store = Arc::clone(&self.store);
        let client = Arc::clone(&self.client);
        let config = self.workflow_config.clone();
        let tokens = Arc::clone(&self.cancel_tokens);
        tokio::spawn(async move {
            workflow::execute(instruction_id, store, client, config, token).await;
            tokens.lock().await.remove(&instruction_id);
        });
    }

    /// Cancel between steps. Fails with a state conflict on a terminal
    /// instruction so double-cancellation surfaces to the caller.
    pub async fn cancel_settlement_instruction(
        &self,
        instruction_id: Uuid,
        reason: impl Into<String>,
    ) -> SettlementResult<SettlementInstruction> {
        let mut instruction = self.get_instruction(instruction_id).await?;
        if instruction.status.is_terminal() {
            return Err(SettlementError::state_conflict(
                instruction_id,
                format!("cannot cancel from {:?}", instruction.status),
            ));
        }

        if let Some(token) = self.cancel_tokens.lock().await.remove(&instruction_id) {
            token.cancel();
        }

        instruction.status = SettlementStatus::Cancelled;
        instruction.cancellation_reason = Some(reason.into());
        instruction.updated_at = Utc::now();
        self.store.update(instruction.clone()).await?;

        info!(
            instruction = %instruction_id,
            reason = instruction.cancellation_reason.as_deref().unwrap_or(""),
            "settlement instruction cancelled"
        );
        Ok(instruction)
    }

    /// Generate per-trade instructions for a batch, then report netting
    /// opportunities by settlement currency. Instructions are created
    /// unrouted for execution later; netting changes funding volume, not
    /// the instructions themselves.
    pub async fn generate_multi_market_instructions(
        &self,
        trades: Vec<TradeLeg>,
    ) -> SettlementResult<(Vec<SettlementInstruction>, NettingReport)> {
        let mut instructions = Vec::with_capacity(trades.len());
        for trade in trades {
            let instruction = self
                .create_settlement_instruction(SettlementRequest {
                    contract_id: trade.contract_id,
                    settlement_type: trade.settlement_type,
                    amount: trade.amount,
                    currency: trade.currency,
                    region: trade.region,
                    delivery_instructions: None,
                    auto_settle: Some(false),
                })
                .await?;
            instructions.push(instruction);
        }

        let report = netting::compute_netting(&instructions);
        info!(
            batch = instructions.len(),
            groups = report.groups.len(),
            total_savings = report.total_savings,
            "netting batch generated"
        );
        Ok((instructions, report))
    }
}
