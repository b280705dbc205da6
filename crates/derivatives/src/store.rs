//! Contract persistence
//!
//! The trait is the seam for a durable backend; the in-memory store backs
//! tests and prototyping.

use crate::types::{Contract, ContractStatus};
use async_trait::async_trait;
use common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn insert(&self, contract: Contract) -> Result<()>;

    async fn get(&self, contract_id: Uuid) -> Result<Option<Contract>>;

    /// Replace a stored contract by id. Errors with `NotFound` if the id
    /// was never inserted.
    async fn update(&self, contract: Contract) -> Result<()>;

    async fn list_for_user(&self, user_id: Uuid, region: &str) -> Result<Vec<Contract>>;

    /// Active contracts on a commodity, across all users. Used by the
    /// mark-to-market pass.
    async fn list_active_by_commodity(&self, commodity: &str) -> Result<Vec<Contract>>;
}

#[derive(Default)]
pub struct InMemoryContractStore {
    contracts: RwLock<HashMap<Uuid, Contract>>,
}

impl InMemoryContractStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    async fn insert(&self, contract: Contract) -> Result<()> {
        self.contracts
            .write()
            .await
            .insert(contract.contract_id, contract);
        Ok(())
    }

    async fn get(&self, contract_id: Uuid) -> Result<Option<Contract>> {
        Ok(self.contracts.read().await.get(&contract_id).cloned())
    }

    async fn update(&self, contract: Contract) -> Result<()> {
        let mut contracts = self.contracts.write().await;
        match contracts.get_mut(&contract.contract_id) {
            Some(existing) => {
                *existing = contract;
                Ok(())
            }
            None => Err(common::Error::not_found(format!(
                "contract {}",
                contract.contract_id
            ))),
        }
    }

    async fn list_for_user(&self, user_id: Uuid, region: &str) -> Result<Vec<Contract>> {
        let mut matched: Vec<Contract> = self
            .contracts
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id && c.region == region)
            .cloned()
            .collect();
        // Stable listing order for pagination
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }

    async fn list_active_by_commodity(&self, commodity: &str) -> Result<Vec<Contract>> {
        Ok(self
            .contracts
            .read()
            .await
            .values()
            .filter(|c| c.commodity == commodity && c.status == ContractStatus::Active)
            .cloned()
            .collect())
    }
}
