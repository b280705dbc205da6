//! Margin account storage
//!
//! The trait allows different storage implementations (in-memory, SQL) to
//! be swapped without changing the business logic. Collateral is mutated
//! only through `replace_collateral`, the single writing entry point per
//! account; the write lock serializes concurrent updates so margin checks
//! always see the latest snapshot.

use crate::error::{MarginError, MarginResult};
use crate::types::{CollateralBalances, MarginAccount, MarginCall, MarginCallStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait MarginAccountStore: Send + Sync {
    /// Fetch an account, if it exists
    async fn get(&self, account_id: Uuid, region: &str) -> MarginResult<Option<MarginAccount>>;

    /// Replace the account's posted collateral, creating the account on
    /// first use. Returns the updated account.
    async fn replace_collateral(
        &self,
        account_id: Uuid,
        region: &str,
        collateral: CollateralBalances,
    ) -> MarginResult<MarginAccount>;

    /// Append a margin call to the account's history
    async fn append_call(&self, call: MarginCall) -> MarginResult<()>;

    /// Transition a call out of `Issued`. Returns false if the call was
    /// already resolved (the transition is applied at most once).
    async fn resolve_call(
        &self,
        account_id: Uuid,
        region: &str,
        call_id: Uuid,
        status: MarginCallStatus,
    ) -> MarginResult<bool>;

    /// All margin calls for an account, newest last
    async fn list_calls(&self, account_id: Uuid, region: &str) -> MarginResult<Vec<MarginCall>>;

    /// Every (account, region) key with a margin account. Drives the
    /// call-expiry sweep.
    async fn account_keys(&self) -> MarginResult<Vec<(Uuid, String)>>;
}

/// In-memory margin account store for testing and development
pub struct InMemoryMarginStore {
    accounts: RwLock<HashMap<(Uuid, String), MarginAccount>>,
}

impl InMemoryMarginStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMarginStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarginAccountStore for InMemoryMarginStore {
    async fn get(&self, account_id: Uuid, region: &str) -> MarginResult<Option<MarginAccount>> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts.get(&(account_id, region.to_string())).cloned())
    }

    async fn replace_collateral(
        &self,
        account_id: Uuid,
        region: &str,
        collateral: CollateralBalances,
    ) -> MarginResult<MarginAccount> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        let account = accounts
            .entry((account_id, region.to_string()))
            .or_insert_with(|| MarginAccount::new(account_id, region));

        account.collateral = collateral;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    async fn append_call(&self, call: MarginCall) -> MarginResult<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        let key = (call.account_id, call.region.clone());
        let account = accounts
            .get_mut(&key)
            .ok_or_else(|| MarginError::InsufficientData(format!("account {}", call.account_id)))?;

        account.calls.push(call);
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn resolve_call(
        &self,
        account_id: Uuid,
        region: &str,
        call_id: Uuid,
        status: MarginCallStatus,
    ) -> MarginResult<bool> {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        let account = accounts
            .get_mut(&(account_id, region.to_string()))
            .ok_or_else(|| MarginError::InsufficientData(format!("account {}", account_id)))?;

        let call = account
            .calls
            .iter_mut()
            .find(|c| c.call_id == call_id)
            .ok_or_else(|| MarginError::InsufficientData(format!("margin call {}", call_id)))?;

        if call.status != MarginCallStatus::Issued {
            return Ok(false);
        }

        call.status = status;
        call.resolved_at = Some(Utc::now());
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_calls(&self, account_id: Uuid, region: &str) -> MarginResult<Vec<MarginCall>> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts
            .get(&(account_id, region.to_string()))
            .map(|a| a.calls.clone())
            .unwrap_or_default())
    }

    async fn account_keys(&self) -> MarginResult<Vec<(Uuid, String)>> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(accounts.keys().cloned().collect())
    }
}
