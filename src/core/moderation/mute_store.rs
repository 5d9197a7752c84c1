// Storage port for mutes.
//
// The core defines WHAT it needs; the infra layer provides SQLite, JSON file
// and in-memory implementations. The ledger only ever sees this trait.

use super::moderation_models::{MuteRecord, SenderId};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(String),
}

/// Persistence for mute records.
///
/// Implementations skip (and log) individual entries they cannot parse
/// in `load_all` instead of failing the whole load.
#[async_trait]
pub trait MuteStore: Send + Sync {
    /// Insert or overwrite the record for a sender.
    async fn save(&self, sender: SenderId, record: MuteRecord) -> Result<(), StoreError>;

    /// Remove a sender's record. Removing a missing record is not an error.
    async fn delete(&self, sender: SenderId) -> Result<(), StoreError>;

    /// Every persisted record.
    async fn load_all(&self) -> Result<HashMap<SenderId, MuteRecord>, StoreError>;
}
