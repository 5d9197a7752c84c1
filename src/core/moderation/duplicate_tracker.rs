// Duplicate spam tracker - per-sender history of recent normalized messages.
//
// A message is flagged when enough near-identical messages (by edit-distance
// similarity) are already in the sender's history inside the cooldown window.

use super::moderation_config::ModerationConfig;
use super::moderation_models::{seconds_span, MessageRecord, SenderId};
use super::similarity::similarity;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;

pub struct DuplicateSpamTracker {
    /// Sender -> recent messages, oldest first
    history: DashMap<SenderId, VecDeque<MessageRecord>>,
}

impl DuplicateSpamTracker {
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
        }
    }

    /// Check a message and, unless it is flagged or skipped, remember it.
    pub fn is_duplicate(
        &self,
        sender: SenderId,
        raw_text: &str,
        has_bypass: bool,
        now: DateTime<Utc>,
        config: &ModerationConfig,
    ) -> bool {
        if has_bypass {
            return false;
        }

        let settings = &config.duplicate_messages;
        let normalized = normalize(raw_text);
        if normalized.chars().count() < settings.min_message_length {
            return false;
        }

        let threshold = config.general.similarity_threshold;
        let cooldown = seconds_span(settings.cooldown_secs);

        // The entry guard keeps prune + count + append atomic for this sender.
        let mut history = self.history.entry(sender).or_default();
        history.retain(|record| now - record.observed_at <= cooldown);

        let similar_count = history
            .iter()
            .filter(|record| {
                let score = similarity(&normalized, &record.normalized);
                if score.saturating_add(10) >= threshold {
                    tracing::trace!(
                        a = %normalized,
                        b = %record.normalized,
                        score,
                        "Similarity check"
                    );
                }
                score >= threshold
            })
            .count();

        if similar_count >= settings.max_repeats {
            tracing::debug!(sender = %sender, similar_count, "Blocked duplicate message");
            return true;
        }

        history.push_back(MessageRecord {
            normalized,
            observed_at: now,
        });
        while history.len() > config.general.message_history_size {
            history.pop_front();
        }

        false
    }

    /// Forget a sender entirely (on disconnect or reload).
    pub fn forget(&self, sender: &SenderId) {
        self.history.remove(sender);
    }

    pub fn clear(&self) {
        self.history.clear();
    }

    /// Drop records older than the cooldown and senders left with nothing.
    pub fn prune(&self, now: DateTime<Utc>, config: &ModerationConfig) {
        let cooldown = seconds_span(config.duplicate_messages.cooldown_secs);
        let senders: Vec<SenderId> = self.history.iter().map(|entry| *entry.key()).collect();

        for sender in senders {
            if let Some(mut history) = self.history.get_mut(&sender) {
                history.retain(|record| now - record.observed_at <= cooldown);
            }
            self.history.remove_if(&sender, |_, history| history.is_empty());
        }
    }

    pub fn tracked_senders(&self) -> usize {
        self.history.len()
    }
}

impl Default for DuplicateSpamTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, collapse whitespace, drop everything but letters, digits and spaces.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}
