//! Derivatives Service
//!
//! Contract lifecycle for futures, options, swaps, and structured notes:
//! creation with validation and margin sizing, Black-Scholes pricing and
//! Greeks for options, mark-to-market over a versioned market snapshot,
//! and termination.

pub mod error;
pub mod market;
pub mod pricing;
pub mod service;
pub mod store;
pub mod types;

pub use error::{DerivativesError, DerivativesResult};
pub use market::{MarketDataStore, MarketQuote};
pub use service::DerivativesService;
pub use store::{ContractStore, InMemoryContractStore};
pub use types::{
    Contract, ContractFilter, ContractPage, ContractStatus, ContractTerms, ExerciseStyle,
    FutureSpec, Greeks, NoteSpec, OptionSpec, OptionType, PaymentFrequency, SwapSpec,
};
