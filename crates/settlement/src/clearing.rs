//! Clearing-network routing and the external clearing client
//!
//! The registry wraps the static network catalog with a mutable health
//! view. Routing matches asset class, currency, and region scope against
//! healthy networks and falls back to the generic cash network. The
//! clearing client is the injectable seam for real connectivity; the
//! simulated client stands in for it with configurable latency and
//! failure injection.

use crate::error::{SettlementError, SettlementResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::AssetClass;
use config::ClearingNetworkConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct NetworkHealth {
    healthy: bool,
    last_heartbeat: DateTime<Utc>,
}

/// Runtime view over the configured clearing networks
pub struct NetworkRegistry {
    networks: Vec<ClearingNetworkConfig>,
    health: RwLock<HashMap<String, NetworkHealth>>,
}

impl NetworkRegistry {
    pub fn new(networks: Vec<ClearingNetworkConfig>) -> Self {
        let health = networks
            .iter()
            .map(|n| {
                (
                    n.id.clone(),
                    NetworkHealth {
                        healthy: true,
                        last_heartbeat: Utc::now(),
                    },
                )
            })
            .collect();
        Self {
            networks,
            health: RwLock::new(health),
        }
    }

    pub fn mark_health(&self, network_id: &str, healthy: bool) {
        let mut health = self.health.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = health.get_mut(network_id) {
            if entry.healthy != healthy {
                warn!(network = network_id, healthy, "clearing network health changed");
            }
            entry.healthy = healthy;
            entry.last_heartbeat = Utc::now();
        }
    }

    pub fn is_healthy(&self, network_id: &str) -> bool {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(network_id)
            .map(|h| h.healthy)
            .unwrap_or(false)
    }

    pub fn last_heartbeat(&self, network_id: &str) -> Option<DateTime<Utc>> {
        self.health
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(network_id)
            .map(|h| h.last_heartbeat)
    }

    fn matches(network: &ClearingNetworkConfig, class: AssetClass, currency: &str, region: &str) -> bool {
        if !network.asset_classes.contains(&class) {
            return false;
        }
        if !network.currencies.iter().any(|c| c == currency) {
            return false;
        }
        // A region-scoped network only serves its own region
        match &network.region {
            Some(scope) => scope == region,
            None => true,
        }
    }

    /// Pick a healthy network serving the asset class and currency,
    /// preferring a specific match over the generic cash fallback.
    pub fn route(
        &self,
        class: AssetClass,
        currency: &str,
        region: &str,
    ) -> SettlementResult<&ClearingNetworkConfig> {
        let specific = self.networks.iter().find(|n| {
            !n.generic_cash_fallback
                && Self::matches(n, class, currency, region)
                && self.is_healthy(&n.id)
        });
        if let Some(network) = specific {
            debug!(network = %network.id, %class, currency, "routed to clearing network");
            return Ok(network);
        }

        let fallback = self
            .networks
            .iter()
            .find(|n| n.generic_cash_fallback && self.is_healthy(&n.id));
        match fallback {
            Some(network) => {
                debug!(network = %network.id, %class, currency, "routed to cash fallback");
                Ok(network)
            }
            None => Err(SettlementError::NetworkUnavailable(format!(
                "{} in {}",
                class, currency
            ))),
        }
    }
}

/// Failure from a clearing submission attempt
#[derive(Debug, Error)]
pub enum ClearingError {
    #[error("Clearing network rejected submission: {0}")]
    Rejected(String),

    #[error("Clearing network unreachable: {0}")]
    Unreachable(String),
}

/// External clearing connectivity. Submissions are per workflow step;
/// retry and timeout policy belongs to the caller.
#[async_trait]
pub trait ClearingClient: Send + Sync {
    async fn submit_step(
        &self,
        instruction_id: Uuid,
        step_name: &str,
    ) -> Result<(), ClearingError>;
}

/// Stand-in for real connectivity: fixed latency per submission, with an
/// optional deterministic failure injector.
pub struct SimulatedClearingClient {
    latency: Duration,
    /// Fail every Nth submission when set
    fail_every: Option<u64>,
    submissions: AtomicU64,
}

impl SimulatedClearingClient {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail_every: None,
            submissions: AtomicU64::new(0),
        }
    }

    pub fn with_failures(latency: Duration, fail_every: u64) -> Self {
        Self {
            latency,
            fail_every: Some(fail_every),
            submissions: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl ClearingClient for SimulatedClearingClient {
    async fn submit_step(
        &self,
        instruction_id: Uuid,
        step_name: &str,
    ) -> Result<(), ClearingError> {
        tokio::time::sleep(self.latency).await;

        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(every) = self.fail_every {
            if n % every == 0 {
                return Err(ClearingError::Unreachable(format!(
                    "simulated outage on {} for {}",
                    step_name, instruction_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::generate_default_config;

    fn registry() -> NetworkRegistry {
        NetworkRegistry::new(generate_default_config().networks)
    }

    #[test]
    fn test_routes_to_specific_network() {
        let registry = registry();
        let network = registry.route(AssetClass::Future, "USD", "US").unwrap();
        assert_eq!(network.id, "cme-clearing");
    }

    #[test]
    fn test_swaps_route_to_swap_network() {
        let registry = registry();
        let network = registry.route(AssetClass::Swap, "USD", "US").unwrap();
        assert_eq!(network.id, "lch-swapclear");
    }

    #[test]
    fn test_unmatched_class_falls_back_to_cash() {
        let registry = registry();
        let network = registry
            .route(AssetClass::StructuredNote, "USD", "US")
            .unwrap();
        assert!(network.generic_cash_fallback);
    }

    #[test]
    fn test_unhealthy_network_skipped() {
        let registry = registry();
        registry.mark_health("cme-clearing", false);

        let network = registry.route(AssetClass::Future, "USD", "US").unwrap();
        assert_ne!(network.id, "cme-clearing");
        assert!(network.generic_cash_fallback);
    }

    #[test]
    fn test_no_healthy_network_errors() {
        let registry = registry();
        for network in &registry.networks {
            registry.mark_health(&network.id.clone(), false);
        }

        assert!(matches!(
            registry.route(AssetClass::Future, "USD", "US"),
            Err(SettlementError::NetworkUnavailable(_))
        ));
    }

    #[test]
    fn test_health_recovers() {
        let registry = registry();
        registry.mark_health("cme-clearing", false);
        registry.mark_health("cme-clearing", true);
        assert!(registry.is_healthy("cme-clearing"));
    }

    #[tokio::test]
    async fn test_simulated_client_failure_injection() {
        let client = SimulatedClearingClient::with_failures(Duration::ZERO, 2);
        let id = Uuid::new_v4();

        assert!(client.submit_step(id, "a").await.is_ok());
        assert!(client.submit_step(id, "b").await.is_err());
        assert!(client.submit_step(id, "c").await.is_ok());
    }
}
