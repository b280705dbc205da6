//! Append-only reconciliation history

use crate::types::ReconciliationRecord;
use async_trait::async_trait;
use common::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Records are written once and never updated
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append(&self, record: ReconciliationRecord) -> Result<()>;

    async fn get(&self, record_id: Uuid) -> Result<Option<ReconciliationRecord>>;

    /// History for an account, oldest first
    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<ReconciliationRecord>>;
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<ReconciliationRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&self, record: ReconciliationRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn get(&self, record_id: Uuid) -> Result<Option<ReconciliationRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.record_id == record_id)
            .cloned())
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<ReconciliationRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect())
    }
}
