//! Margin Service for OpenClear
//!
//! Computes standalone and portfolio margin, tracks collateral per
//! account, and drives the margin-call state machine (issue, cure,
//! one-shot auto-liquidation).
//!
//! Contract data is reached through the [`PositionSource`] trait so this
//! crate stays independent of the derivatives crate; `DerivativesService`
//! implements it.

pub mod calculator;
pub mod calls;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

pub use calculator::{MarginCalculator, PortfolioBreakdown, StandaloneMargin};
pub use error::{MarginError, MarginResult};
pub use service::{MarginService, PositionSource};
pub use store::{InMemoryMarginStore, MarginAccountStore};
pub use types::{
    CollateralBalances, ContractExposure, MarginAccount, MarginCall, MarginCallStatus,
    MarginCallType, MarginCheck, MarginCheckStatus, PortfolioMargin,
};
