//! Reconciliation Engine
//!
//! Three-way comparison of the engine's own books against clearing-house,
//! custodian, and counterparty views. Mismatches become breaks with a
//! severity score; low-impact single-occurrence breaks are auto-resolved,
//! the rest are routed for sign-off. Runs are append-only history and
//! never mutate trading state.

pub mod engine;
pub mod error;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod types;

pub use engine::ReconciliationEngine;
pub use error::{ReconciliationError, ReconciliationResult};
pub use scheduler::ReconciliationScheduler;
pub use sources::{InternalLedgerView, LedgerViewProvider, StaticLedgerView};
pub use store::{InMemoryRecordStore, RecordStore};
pub use types::{
    BreakCategory, BreakSeverity, LedgerSnapshot, ReconciliationBreak, ReconciliationRecord,
    ReconciliationType, Resolution,
};
