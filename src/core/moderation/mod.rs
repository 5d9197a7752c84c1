// Core moderation module - the message decision pipeline and mute lifecycle.

pub mod duplicate_tracker;
pub mod flood_tracker;
pub mod moderation_config;
pub mod moderation_models;
pub mod moderation_service;
pub mod mute_ledger;
pub mod mute_store;
pub mod similarity;
pub mod snapshot;
pub mod word_filter;

pub use moderation_config::{ConfigError, ModerationConfig, StorageBackend};
pub use moderation_models::*;
pub use moderation_service::{spawn_maintenance, ModerationPipeline};
pub use mute_ledger::MuteLedger;
pub use mute_store::{MuteStore, StoreError};
