// In-memory implementation of MuteStore.
//
// Nothing survives a restart. Useful for tests and for running without
// any writable storage.

use crate::core::moderation::{MuteRecord, MuteStore, SenderId, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryMuteStore {
    data: DashMap<SenderId, MuteRecord>,
}

impl InMemoryMuteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MuteStore for InMemoryMuteStore {
    async fn save(&self, sender: SenderId, record: MuteRecord) -> Result<(), StoreError> {
        self.data.insert(sender, record);
        Ok(())
    }

    async fn delete(&self, sender: SenderId) -> Result<(), StoreError> {
        self.data.remove(&sender);
        Ok(())
    }

    async fn load_all(&self) -> Result<HashMap<SenderId, MuteRecord>, StoreError> {
        Ok(self
            .data
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect())
    }
}
