//! Versioned market-data snapshot
//!
//! Updates bump a global version so a mark-to-market pass can record which
//! snapshot a contract's Greeks were computed against. Quotes are replaced
//! whole; there is no partial field update.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// One commodity's quote
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub spot: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
}

#[derive(Debug, Default)]
pub struct MarketDataStore {
    quotes: RwLock<HashMap<String, MarketQuote>>,
    version: AtomicU64,
}

impl MarketDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a commodity's quote, returning the new snapshot version
    pub fn update(&self, commodity: &str, quote: MarketQuote) -> u64 {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        self.quotes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(commodity.to_string(), quote);
        debug!(commodity, version, spot = quote.spot, "market quote updated");
        version
    }

    pub fn get(&self, commodity: &str) -> Option<MarketQuote> {
        self.quotes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(commodity)
            .copied()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
