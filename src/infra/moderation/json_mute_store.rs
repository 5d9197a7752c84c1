use crate::core::moderation::{MuteRecord, MuteStore, SenderId, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Flat-file mute store. Persists every mute in a single JSON object:
/// { "<sender uuid>": { "original_duration_secs": .., "state": .., .. } }
///
/// Entries are kept as raw JSON so one bad key or value never poisons the rest.
pub struct JsonMuteStore {
    path: PathBuf,
    cache: RwLock<Map<String, Value>>,
}

impl JsonMuteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|raw| serde_json::from_str::<Map<String, Value>>(&raw).map_err(StoreError::from))
            {
                Ok(map) => map,
                Err(e) => {
                    tracing::error!(path = %path.display(), "Unreadable mutes file, starting empty: {}", e);
                    let backup = path.with_extension("json.bak");
                    if let Err(e) = std::fs::rename(&path, &backup) {
                        tracing::warn!("Failed to back up unreadable mutes file: {}", e);
                    }
                    Map::new()
                }
            }
        } else {
            Map::new()
        };

        Self {
            path,
            cache: RwLock::new(cache),
        }
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let cache = self.cache.read().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &*cache)?;
        Ok(())
    }
}

#[async_trait]
impl MuteStore for JsonMuteStore {
    async fn save(&self, sender: SenderId, record: MuteRecord) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        let mut cache = self.cache.write().await;
        cache.insert(sender.to_string(), value);
        drop(cache); // Release lock before persisting
        self.persist().await
    }

    async fn delete(&self, sender: SenderId) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        let existed = cache.remove(&sender.to_string()).is_some();
        drop(cache);
        if !existed {
            return Ok(());
        }

        self.persist().await
    }

    async fn load_all(&self) -> Result<HashMap<SenderId, MuteRecord>, StoreError> {
        let cache = self.cache.read().await;
        let mut mutes = HashMap::with_capacity(cache.len());

        for (key, value) in cache.iter() {
            let Ok(sender) = Uuid::parse_str(key) else {
                tracing::warn!("Invalid UUID in mutes file: {}", key);
                continue;
            };
            match serde_json::from_value::<MuteRecord>(value.clone()) {
                Ok(record) => {
                    mutes.insert(sender, record);
                }
                Err(e) => tracing::warn!("Invalid mute entry for {}: {}", key, e),
            }
        }

        Ok(mutes)
    }
}
