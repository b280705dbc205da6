//! Settlement Service
//!
//! Turns contracts into settlement obligations and drives each instruction
//! through an ordered workflow: fee computation, clearing-network routing
//! with a generic cash fallback, per-instruction async execution with
//! between-step cancellation, and batch netting across currencies.

pub mod clearing;
pub mod error;
pub mod netting;
pub mod rules;
pub mod service;
pub mod store;
pub mod types;
pub mod workflow;

pub use clearing::{ClearingClient, ClearingError, NetworkRegistry, SimulatedClearingClient};
pub use error::{SettlementError, SettlementResult};
pub use netting::{NettingGroup, NettingReport};
pub use service::{SettlementRequest, SettlementService, TradeLeg};
pub use store::{InMemoryInstructionStore, InstructionStore};
pub use types::{
    DeliveryInstructions, MarginStatus, Obligations, SettlementInstruction, SettlementStatus,
    StepStatus, Workflow, WorkflowStep,
};
