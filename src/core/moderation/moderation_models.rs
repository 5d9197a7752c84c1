// Moderation domain models - data structures for the chat moderation engine.
//
// These are pure domain types with no host dependencies.
// The console layer converts verdicts into host actions (cancel, kick, notify).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a message author.
pub type SenderId = Uuid;

/// Longest span any configured or requested duration may cover (ten years).
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Whole seconds as a `Duration`, capped at `MAX_DURATION_SECS`.
pub fn seconds_span(secs: u64) -> Duration {
    Duration::try_seconds(secs.min(MAX_DURATION_SECS) as i64).unwrap_or(Duration::MAX)
}

/// Whole minutes as a `Duration`, capped at `MAX_DURATION_SECS`.
pub fn minutes_span(minutes: u64) -> Duration {
    seconds_span(minutes.saturating_mul(60))
}

/// `at + span`, saturating at the latest representable instant.
pub fn saturating_add(at: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    at.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Why a message was cancelled without further punishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Message contained a configured blocked word (possibly obfuscated)
    BlockedWord,
    /// Message was a near-duplicate of recent messages from the same sender
    Duplicate,
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::BlockedWord => write!(f, "blocked-word"),
            BlockReason::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// The single decision returned for every inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Deliver the message
    Allow,
    /// Cancel the message
    Blocked(BlockReason),
    /// Cancel the message; sender is muted for this many more seconds
    MuteBlocked { remaining_secs: u64 },
    /// Cancel the message and disconnect the sender for flooding.
    /// `muted_for_secs` is set when this trigger escalated into an auto-mute.
    KickFlood { muted_for_secs: Option<u64> },
}

/// A normalized message kept in a sender's duplicate-detection history.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub normalized: String,
    pub observed_at: DateTime<Utc>,
}

/// Where a mute's clock currently lives.
///
/// Only one of the two is ever authoritative, so they are variants rather
/// than sibling fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MuteState {
    /// Timer is running; the mute ends at `ends_at`
    Active { ends_at: DateTime<Utc> },
    /// Sender is offline; the timer is frozen with this much left
    Paused { remaining_ms: i64 },
}

/// A sender's mute, as held by the ledger and mirrored to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteRecord {
    pub original_duration_secs: u64,
    #[serde(flatten)]
    pub state: MuteState,
}

impl MuteRecord {
    /// A fresh, running mute starting at `now`. Durations are capped at
    /// `MAX_DURATION_SECS`.
    pub fn starting(now: DateTime<Utc>, duration_secs: u64) -> Self {
        let duration_secs = duration_secs.min(MAX_DURATION_SECS);
        Self {
            original_duration_secs: duration_secs,
            state: MuteState::Active {
                ends_at: saturating_add(now, seconds_span(duration_secs)),
            },
        }
    }

    /// Restart a paused clock at `now`. Running records are returned unchanged.
    pub fn resumed(self, now: DateTime<Utc>) -> Self {
        let MuteState::Paused { remaining_ms } = self.state else {
            return self;
        };
        let remaining_ms = remaining_ms.clamp(0, (MAX_DURATION_SECS * 1000) as i64);
        let span = Duration::try_milliseconds(remaining_ms).unwrap_or(Duration::MAX);
        Self {
            state: MuteState::Active {
                ends_at: saturating_add(now, span),
            },
            ..self
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, MuteState::Paused { .. })
    }

    /// True when the record is running and its end time has been reached.
    /// Paused records never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            MuteState::Active { ends_at } => now >= ends_at,
            MuteState::Paused { .. } => false,
        }
    }

    /// Whole seconds left, never negative.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        let remaining_ms = match self.state {
            MuteState::Active { ends_at } => (ends_at - now).num_milliseconds(),
            MuteState::Paused { remaining_ms } => remaining_ms,
        };
        (remaining_ms.max(0) / 1000) as u64
    }
}

/// Per-sender flood escalation bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct EscalationCounter {
    pub count: u32,
    pub last_violation_at: DateTime<Utc>,
}
