//! Settlement instruction persistence

use crate::types::SettlementInstruction;
use async_trait::async_trait;
use common::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait InstructionStore: Send + Sync {
    async fn insert(&self, instruction: SettlementInstruction) -> Result<()>;

    async fn get(&self, instruction_id: Uuid) -> Result<Option<SettlementInstruction>>;

    /// Replace a stored instruction by id. Errors with `NotFound` if the
    /// id was never inserted.
    async fn update(&self, instruction: SettlementInstruction) -> Result<()>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SettlementInstruction>>;
}

#[derive(Default)]
pub struct InMemoryInstructionStore {
    instructions: RwLock<HashMap<Uuid, SettlementInstruction>>,
}

impl InMemoryInstructionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl InstructionStore for InMemoryInstructionStore {
    async fn insert(&self, instruction: SettlementInstruction) -> Result<()> {
        self.instructions
            .write()
            .await
            .insert(instruction.instruction_id, instruction);
        Ok(())
    }

    async fn get(&self, instruction_id: Uuid) -> Result<Option<SettlementInstruction>> {
        Ok(self.instructions.read().await.get(&instruction_id).cloned())
    }

    async fn update(&self, instruction: SettlementInstruction) -> Result<()> {
        let mut instructions = self.instructions.write().await;
        match instructions.get_mut(&instruction.instruction_id) {
            Some(existing) => {
                *existing = instruction;
                Ok(())
            }
            None => Err(common::Error::not_found(format!(
                "settlement instruction {}",
                instruction.instruction_id
            ))),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SettlementInstruction>> {
        let mut matched: Vec<SettlementInstruction> = self
            .instructions
            .read()
            .await
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }
}
