// Moderation configuration - every tunable the engine reads.
//
// Loaded from a JSON file, validated once, then shared as an immutable
// snapshot. Reloading builds a brand new snapshot instead of editing this one.

use super::moderation_models::MAX_DURATION_SECS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub general: GeneralSettings,
    pub duplicate_messages: DuplicateSettings,
    pub blocked_words: BlockedWordSettings,
    pub flood: FloodSettings,
    pub auto_mute: AutoMuteSettings,
    pub permissions: PermissionSettings,
    pub storage: StorageSettings,
    pub maintenance: MaintenanceSettings,
    pub messages: MessageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Messages remembered per sender for duplicate detection
    pub message_history_size: usize,
    /// Minimum similarity percentage (0-100) for two messages to count as duplicates
    pub similarity_threshold: u8,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            message_history_size: 10,
            similarity_threshold: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateSettings {
    /// Similar messages already in history that trip the filter
    pub max_repeats: usize,
    /// How long a message stays in history (seconds)
    pub cooldown_secs: u64,
    /// Normalized messages shorter than this are never compared
    pub min_message_length: usize,
}

impl Default for DuplicateSettings {
    fn default() -> Self {
        Self {
            max_repeats: 2,
            cooldown_secs: 30,
            min_message_length: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockedWordSettings {
    pub enabled: bool,
    pub words: Vec<String>,
    pub block_partial_matches: bool,
    pub min_word_length: usize,
}

impl Default for BlockedWordSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            words: Vec::new(),
            block_partial_matches: false,
            min_word_length: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodSettings {
    pub enabled: bool,
    /// Messages inside the window that count as a flood
    pub message_threshold: usize,
    pub time_window_secs: u64,
}

impl Default for FloodSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            message_threshold: 7, // 7 messages...
            time_window_secs: 5,  // ...in 5 seconds
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoMuteSettings {
    pub enabled: bool,
    /// Flood kicks inside the window before an automatic mute
    pub kick_threshold: u32,
    pub kick_window_minutes: u64,
    pub mute_duration_secs: u64,
}

impl Default for AutoMuteSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kick_threshold: 3,
            kick_window_minutes: 10,
            mute_duration_secs: 300, // 5 minute mute
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSettings {
    /// Permission node that exempts a sender from every check
    pub bypass: String,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            bypass: "chatmanagement.bypass".to_string(),
        }
    }
}

/// Which `MuteStore` implementation the host wires in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Json,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub sqlite_path: String,
    pub json_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            sqlite_path: "data/chat_guard.db".to_string(),
            json_path: "data/mutes.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceSettings {
    pub sweep_interval_ms: u64,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 1000,
        }
    }
}

/// Text the host shows to senders. `{time}` and `{duration}` are placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    pub mute_notice: String,
    pub muted_notification: String,
    pub kick_message: String,
    pub blocked_notice: String,
    pub notify_blocked: bool,
    pub notify_mute: bool,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            mute_notice: "You are muted for spamming. Time remaining: {time} seconds.".to_string(),
            muted_notification: "You have been muted for {duration} seconds for repeated spamming."
                .to_string(),
            kick_message: "You have been kicked for spamming!".to_string(),
            blocked_notice: "Your message was blocked.".to_string(),
            notify_blocked: false,
            notify_mute: true,
        }
    }
}

impl ModerationConfig {
    /// Read and validate a config file. A missing file means "all defaults".
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: ModerationConfig = serde_json::from_str(&raw)?;
        Ok(config.validated())
    }

    /// Clamp out-of-range values instead of rejecting the whole file.
    pub fn validated(mut self) -> Self {
        if self.general.similarity_threshold > 100 {
            tracing::warn!(
                value = self.general.similarity_threshold,
                "similarity_threshold above 100, clamping"
            );
            self.general.similarity_threshold = 100;
        }
        if self.general.message_history_size == 0 {
            tracing::warn!("message_history_size must be at least 1, using 1");
            self.general.message_history_size = 1;
        }
        if self.duplicate_messages.max_repeats == 0 {
            tracing::warn!("max_repeats must be at least 1, using 1");
            self.duplicate_messages.max_repeats = 1;
        }
        if self.flood.message_threshold == 0 {
            tracing::warn!("flood message_threshold must be at least 1, using 1");
            self.flood.message_threshold = 1;
        }
        if self.auto_mute.kick_threshold == 0 {
            tracing::warn!("auto_mute kick_threshold must be at least 1, using 1");
            self.auto_mute.kick_threshold = 1;
        }
        for (name, secs) in [
            ("cooldown_secs", &mut self.duplicate_messages.cooldown_secs),
            ("time_window_secs", &mut self.flood.time_window_secs),
            ("mute_duration_secs", &mut self.auto_mute.mute_duration_secs),
        ] {
            if *secs > MAX_DURATION_SECS {
                tracing::warn!(value = *secs, "{} above {}, clamping", name, MAX_DURATION_SECS);
                *secs = MAX_DURATION_SECS;
            }
        }
        if self.auto_mute.kick_window_minutes > MAX_DURATION_SECS / 60 {
            tracing::warn!(
                value = self.auto_mute.kick_window_minutes,
                "kick_window_minutes above {}, clamping",
                MAX_DURATION_SECS / 60
            );
            self.auto_mute.kick_window_minutes = MAX_DURATION_SECS / 60;
        }
        if self.maintenance.sweep_interval_ms == 0 {
            tracing::warn!("sweep_interval_ms must be positive, using 1000");
            self.maintenance.sweep_interval_ms = 1000;
        }
        self
    }
}
