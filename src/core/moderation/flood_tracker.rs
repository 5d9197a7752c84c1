// Flood tracker - sliding-window rate detection plus kick-to-mute escalation.
//
// Every message timestamp goes into the sender's window. When the window
// fills up the sender is flagged for a kick, the window is cleared, and the
// kick is counted towards an automatic mute.

use super::moderation_config::ModerationConfig;
use super::moderation_models::{minutes_span, seconds_span, EscalationCounter, SenderId};
use super::mute_ledger::MuteLedger;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

/// Result of a flood check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodOutcome {
    Clear,
    /// Rate exceeded. `muted_for_secs` is set when this kick triggered an auto-mute.
    Flooding { muted_for_secs: Option<u64> },
}

pub struct FloodTracker {
    windows: DashMap<SenderId, VecDeque<DateTime<Utc>>>,
    /// Survives disconnects on purpose; only the window is per-session.
    escalations: DashMap<SenderId, EscalationCounter>,
    mutes: Arc<MuteLedger>,
}

impl FloodTracker {
    pub fn new(mutes: Arc<MuteLedger>) -> Self {
        Self {
            windows: DashMap::new(),
            escalations: DashMap::new(),
            mutes,
        }
    }

    /// Record this message and report whether the sender is flooding.
    pub fn check(
        &self,
        sender: SenderId,
        has_bypass: bool,
        now: DateTime<Utc>,
        config: &ModerationConfig,
    ) -> FloodOutcome {
        if has_bypass || !config.flood.enabled {
            return FloodOutcome::Clear;
        }

        let window = seconds_span(config.flood.time_window_secs);
        let threshold = config.flood.message_threshold;

        let burst = {
            let mut times = self.windows.entry(sender).or_default();
            times.push_back(now);
            times.retain(|t| now - *t <= window);

            if times.len() >= threshold {
                let burst = times.len();
                // so the rest of this burst doesn't re-trigger on every message
                times.clear();
                Some(burst)
            } else {
                None
            }
        };

        let Some(burst) = burst else {
            return FloodOutcome::Clear;
        };

        tracing::debug!(
            sender = %sender,
            messages = burst,
            window_secs = config.flood.time_window_secs,
            "Rapid spam detected"
        );

        let muted_for_secs = self.escalate(sender, now, config);
        FloodOutcome::Flooding { muted_for_secs }
    }

    /// Count a flood kick; mute the sender once enough land inside the window.
    /// Returns the mute duration if a mute was applied.
    fn escalate(
        &self,
        sender: SenderId,
        now: DateTime<Utc>,
        config: &ModerationConfig,
    ) -> Option<u64> {
        let settings = &config.auto_mute;
        if !settings.enabled {
            return None;
        }

        let window = minutes_span(settings.kick_window_minutes);

        let mut counter = self
            .escalations
            .entry(sender)
            .or_insert(EscalationCounter {
                count: 0,
                last_violation_at: now,
            });

        if now - counter.last_violation_at > window {
            counter.count = 1;
        } else {
            counter.count += 1;
        }
        counter.last_violation_at = now;

        if counter.count < settings.kick_threshold {
            tracing::debug!(sender = %sender, kicks = counter.count, "Flood kick counted");
            return None;
        }

        counter.count = 0;
        drop(counter);

        self.mutes.mute(sender, settings.mute_duration_secs, now);
        tracing::info!(
            sender = %sender,
            duration_secs = settings.mute_duration_secs,
            "Auto-muted sender for repeated spam kicks"
        );
        Some(settings.mute_duration_secs)
    }

    /// Drop the sender's rate window (disconnect). Escalation is kept.
    pub fn forget(&self, sender: &SenderId) {
        self.windows.remove(sender);
    }

    /// Drop every rate window (reload). Escalation is kept.
    pub fn clear_windows(&self) {
        self.windows.clear();
    }

    /// Trim stale timestamps and escalation counters past their window.
    pub fn prune(&self, now: DateTime<Utc>, config: &ModerationConfig) {
        let window = seconds_span(config.flood.time_window_secs);
        let senders: Vec<SenderId> = self.windows.iter().map(|e| *e.key()).collect();
        for sender in senders {
            if let Some(mut times) = self.windows.get_mut(&sender) {
                times.retain(|t| now - *t <= window);
            }
            self.windows.remove_if(&sender, |_, times| times.is_empty());
        }

        let escalation_window = minutes_span(config.auto_mute.kick_window_minutes);
        self.escalations
            .retain(|_, counter| now - counter.last_violation_at <= escalation_window);
    }

    pub fn violations(&self, sender: &SenderId) -> u32 {
        self.escalations.get(sender).map(|c| c.count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::moderation_models::MuteRecord;
    use crate::core::moderation::mute_store::{MuteStore, StoreError};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::collections::HashMap;
    use uuid::Uuid;

    struct NullStore;

    #[async_trait]
    impl MuteStore for NullStore {
        async fn save(&self, _: SenderId, _: MuteRecord) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete(&self, _: SenderId) -> Result<(), StoreError> {
            Ok(())
        }
        async fn load_all(&self) -> Result<HashMap<SenderId, MuteRecord>, StoreError> {
            Ok(HashMap::new())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn config() -> ModerationConfig {
        let mut config = ModerationConfig::default();
        config.flood.message_threshold = 5;
        config.flood.time_window_secs = 5;
        config.auto_mute.kick_threshold = 3;
        config.auto_mute.kick_window_minutes = 10;
        config.auto_mute.mute_duration_secs = 300;
        config
    }

    fn flooding(outcome: &FloodOutcome) -> bool {
        matches!(outcome, FloodOutcome::Flooding { .. })
    }

    async fn tracker() -> (Arc<MuteLedger>, FloodTracker) {
        let ledger = Arc::new(MuteLedger::load(Arc::new(NullStore)).await);
        let tracker = FloodTracker::new(Arc::clone(&ledger));
        (ledger, tracker)
    }

    /// Send `n` messages 100ms apart starting at `start`; return the outcomes.
    fn burst(
        tracker: &FloodTracker,
        sender: SenderId,
        start: DateTime<Utc>,
        n: usize,
        config: &ModerationConfig,
    ) -> Vec<FloodOutcome> {
        (0..n)
            .map(|i| {
                let at = start + Duration::milliseconds(100 * i as i64);
                tracker.check(sender, false, at, config)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fifth_message_in_a_second_floods() {
        let (_ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let config = config();

        let outcomes = burst(&tracker, sender, t0(), 5, &config);
        assert!(outcomes[..4].iter().all(|o| !flooding(o)));
        assert!(flooding(&outcomes[4]));

        // window was reset by the trigger
        let next = tracker.check(sender, false, t0() + Duration::milliseconds(500), &config);
        assert!(!flooding(&next));
    }

    #[tokio::test]
    async fn test_slow_messages_never_flood() {
        let (_ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let config = config();

        for i in 0..20 {
            let at = t0() + Duration::seconds(2 * i);
            assert_eq!(tracker.check(sender, false, at, &config), FloodOutcome::Clear);
        }
    }

    #[tokio::test]
    async fn test_bypass_and_disabled() {
        let (_ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let mut config = config();

        for _ in 0..10 {
            assert_eq!(tracker.check(sender, true, t0(), &config), FloodOutcome::Clear);
        }

        config.flood.enabled = false;
        for _ in 0..10 {
            assert_eq!(tracker.check(sender, false, t0(), &config), FloodOutcome::Clear);
        }
    }

    #[tokio::test]
    async fn test_three_kicks_in_window_mute() {
        let (ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let config = config();

        let first = burst(&tracker, sender, t0(), 5, &config);
        assert_eq!(first[4], FloodOutcome::Flooding { muted_for_secs: None });
        let second = burst(&tracker, sender, t0() + Duration::minutes(1), 5, &config);
        assert_eq!(second[4], FloodOutcome::Flooding { muted_for_secs: None });
        assert_eq!(tracker.violations(&sender), 2);

        let third_at = t0() + Duration::minutes(2);
        let third = burst(&tracker, sender, third_at, 5, &config);
        assert_eq!(third[4], FloodOutcome::Flooding { muted_for_secs: Some(300) });
        assert!(ledger.is_muted(sender, third_at + Duration::seconds(1)));
        assert_eq!(tracker.violations(&sender), 0);

        // counter restarted: the next kick alone does not re-mute
        ledger.unmute(sender);
        let fourth = burst(&tracker, sender, third_at + Duration::minutes(1), 5, &config);
        assert_eq!(fourth[4], FloodOutcome::Flooding { muted_for_secs: None });
        assert!(!ledger.is_muted(sender, third_at + Duration::minutes(2)));
        assert_eq!(tracker.violations(&sender), 1);
    }

    #[tokio::test]
    async fn test_kicks_outside_window_reset_counter() {
        let (ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let config = config();

        burst(&tracker, sender, t0(), 5, &config);
        burst(&tracker, sender, t0() + Duration::minutes(5), 5, &config);
        // more than 10 minutes after the previous kick
        let late = t0() + Duration::minutes(16);
        let outcomes = burst(&tracker, sender, late, 5, &config);

        assert_eq!(outcomes[4], FloodOutcome::Flooding { muted_for_secs: None });
        assert_eq!(tracker.violations(&sender), 1);
        assert_eq!(ledger.len(), 0);
    }

    #[tokio::test]
    async fn test_auto_mute_disabled_still_kicks() {
        let (ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let mut config = config();
        config.auto_mute.enabled = false;

        for round in 0..5 {
            let outcomes = burst(&tracker, sender, t0() + Duration::minutes(round), 5, &config);
            assert_eq!(outcomes[4], FloodOutcome::Flooding { muted_for_secs: None });
        }
        assert_eq!(ledger.len(), 0);
        assert_eq!(tracker.violations(&sender), 0);
    }

    #[tokio::test]
    async fn test_unbounded_windows_do_not_panic() {
        let (ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let mut config = config();
        config.flood.time_window_secs = u64::MAX;
        config.auto_mute.kick_window_minutes = u64::MAX;
        config.auto_mute.mute_duration_secs = u64::MAX;

        for round in 0..3 {
            let outcomes = burst(&tracker, sender, t0() + Duration::days(round), 5, &config);
            assert!(flooding(&outcomes[4]));
        }
        assert!(ledger.is_muted(sender, t0() + Duration::days(365)));

        tracker.prune(t0() + Duration::days(365), &config);
    }

    #[tokio::test]
    async fn test_forget_keeps_escalation() {
        let (_ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let config = config();

        burst(&tracker, sender, t0(), 5, &config);
        burst(&tracker, sender, t0() + Duration::seconds(10), 3, &config);
        tracker.forget(&sender);

        assert!(tracker.windows.get(&sender).is_none());
        assert_eq!(tracker.violations(&sender), 1);
    }

    #[tokio::test]
    async fn test_prune_drops_stale_state() {
        let (_ledger, tracker) = tracker().await;
        let sender = Uuid::new_v4();
        let config = config();

        burst(&tracker, sender, t0(), 5, &config);
        burst(&tracker, sender, t0() + Duration::seconds(10), 2, &config);

        tracker.prune(t0() + Duration::seconds(12), &config);
        assert!(tracker.windows.get(&sender).is_some());
        assert_eq!(tracker.violations(&sender), 1);

        tracker.prune(t0() + Duration::minutes(11), &config);
        assert!(tracker.windows.get(&sender).is_none());
        assert_eq!(tracker.violations(&sender), 0);
    }
}
