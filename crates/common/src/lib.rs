//! Common types and utilities shared across OpenClear crates
//!
//! This crate provides:
//! - Domain types used by every engine crate (asset classes, settlement
//!   types, collateral kinds)
//! - Common error types
//! - Business-day date helpers
//! - The notification outbox (durable, at-least-once outbound messages)

pub mod bizdate;
pub mod error;
pub mod outbox;
pub mod types;

pub use error::{Error, Result};
pub use types::{AssetClass, CollateralKind, Direction, SettlementType};
