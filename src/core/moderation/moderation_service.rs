// Moderation pipeline - core business logic for chat moderation.
//
// Every inbound message goes through a fixed chain, first non-allow wins:
// - Bypass permission (skip everything)
// - Active mute
// - Flood detection (cheap, counter based; may escalate into a mute)
// - Blocked words
// - Duplicate spam
//
// NO host dependencies here - just pure domain logic.

use super::duplicate_tracker::DuplicateSpamTracker;
use super::flood_tracker::{FloodOutcome, FloodTracker};
use super::moderation_config::ModerationConfig;
use super::moderation_models::{BlockReason, SenderId, Verdict};
use super::mute_ledger::MuteLedger;
use super::snapshot::Snapshot;
use super::word_filter::BlockedWordFilter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct ModerationPipeline {
    config: Snapshot<ModerationConfig>,
    words: BlockedWordFilter,
    duplicates: DuplicateSpamTracker,
    flood: FloodTracker,
    mutes: Arc<MuteLedger>,
}

impl ModerationPipeline {
    /// Create a pipeline around an already loaded mute ledger.
    pub fn new(config: ModerationConfig, mutes: Arc<MuteLedger>) -> Self {
        Self {
            words: BlockedWordFilter::new(&config.blocked_words),
            duplicates: DuplicateSpamTracker::new(),
            flood: FloodTracker::new(Arc::clone(&mutes)),
            config: Snapshot::new(config),
            mutes,
        }
    }

    /// The configuration snapshot currently in force.
    pub fn config(&self) -> Arc<ModerationConfig> {
        self.config.load()
    }

    pub fn mutes(&self) -> &MuteLedger {
        &self.mutes
    }

    pub fn words(&self) -> &BlockedWordFilter {
        &self.words
    }

    /// Flood kicks counted toward the next auto-mute.
    pub fn flood_violations(&self, sender: SenderId) -> u32 {
        self.flood.violations(&sender)
    }

    /// Senders with a live duplicate-detection history.
    pub fn tracked_senders(&self) -> usize {
        self.duplicates.tracked_senders()
    }

    /// Decide what happens to one chat message.
    ///
    /// # Arguments
    /// * `sender` - Who sent the message
    /// * `text` - The raw message text
    /// * `has_bypass` - Whether the host granted the sender the bypass permission
    /// * `now` - When the message arrived
    pub fn evaluate(
        &self,
        sender: SenderId,
        text: &str,
        has_bypass: bool,
        now: DateTime<Utc>,
    ) -> Verdict {
        if has_bypass {
            return Verdict::Allow;
        }

        // One snapshot for the whole evaluation, even if a reload lands mid-way
        let config = self.config.load();

        if let Some(remaining_secs) = self.mutes.muted_remaining(sender, now) {
            return Verdict::MuteBlocked { remaining_secs };
        }

        if let FloodOutcome::Flooding { muted_for_secs } =
            self.flood.check(sender, has_bypass, now, &config)
        {
            return Verdict::KickFlood { muted_for_secs };
        }

        if self.words.contains(text) {
            tracing::debug!(sender = %sender, "Blocked message (blocked word)");
            return Verdict::Blocked(BlockReason::BlockedWord);
        }

        if self
            .duplicates
            .is_duplicate(sender, text, has_bypass, now, &config)
        {
            tracing::debug!(sender = %sender, "Blocked message (duplicate)");
            return Verdict::Blocked(BlockReason::Duplicate);
        }

        Verdict::Allow
    }

    /// Sender came (back) online: resume a paused mute.
    pub fn on_connect(&self, sender: SenderId, now: DateTime<Utc>) {
        self.mutes.on_reconnect(sender, now);
    }

    /// Sender went offline: pause their mute and drop session-only state.
    /// Mutes and escalation counters survive.
    pub fn on_disconnect(&self, sender: SenderId, now: DateTime<Utc>) {
        self.mutes.on_disconnect(sender, now);
        self.duplicates.forget(&sender);
        self.flood.forget(&sender);
    }

    /// Swap in a new configuration.
    ///
    /// The pattern set is rebuilt and published in one step, rate windows and
    /// duplicate histories start over, and mutes are re-read from storage.
    pub async fn reload(&self, config: ModerationConfig) {
        self.words.reload(&config.blocked_words);
        self.config.replace(config);
        self.duplicates.clear();
        self.flood.clear_windows();
        self.mutes.reload_from_store().await;
        tracing::info!("Moderation configuration reloaded");
    }

    /// Periodic maintenance: expire due mutes and trim per-sender history.
    /// Returns how many mutes expired.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let config = self.config.load();
        let expired = self.mutes.sweep(now);
        self.duplicates.prune(now, &config);
        self.flood.prune(now, &config);
        if expired > 0 {
            tracing::debug!("Auto-unmuted {} senders", expired);
        }
        expired
    }
}

/// Run `sweep` forever at the configured cadence (re-read every tick).
pub fn spawn_maintenance(pipeline: Arc<ModerationPipeline>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = pipeline.config().maintenance.sweep_interval_ms;
            tokio::time::sleep(Duration::from_millis(interval)).await;
            pipeline.sweep(Utc::now());
        }
    })
}

// ============================================================================
// TESTS
// ============================================================================
