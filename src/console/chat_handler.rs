// Console-side chat handling - translates core verdicts into host actions.

use crate::core::moderation::moderation_config::MessageSettings;
use crate::core::moderation::Verdict;

/// What the host does with a message once the pipeline has decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Broadcast the message
    Deliver,
    /// Drop the message, optionally telling the sender why
    Cancel { notice: Option<String> },
    /// Drop the message and disconnect the sender.
    /// `mute_notice` is set when the kick escalated into a mute.
    Kick {
        reason: String,
        mute_notice: Option<String>,
    },
}

/// Fill `{name}` placeholders in a configured message template.
pub fn render_template(template: &str, values: &[(&str, u64)]) -> String {
    values.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), &value.to_string())
    })
}

/// Map a verdict to the action the host applies.
pub fn action_for(verdict: &Verdict, messages: &MessageSettings) -> ChatAction {
    match verdict {
        Verdict::Allow => ChatAction::Deliver,

        Verdict::MuteBlocked { remaining_secs } => ChatAction::Cancel {
            notice: Some(render_template(
                &messages.mute_notice,
                &[("time", *remaining_secs)],
            )),
        },

        Verdict::Blocked(_) => ChatAction::Cancel {
            notice: messages
                .notify_blocked
                .then(|| messages.blocked_notice.clone()),
        },

        Verdict::KickFlood { muted_for_secs } => ChatAction::Kick {
            reason: messages.kick_message.clone(),
            mute_notice: muted_for_secs
                .filter(|_| messages.notify_mute)
                .map(|secs| render_template(&messages.muted_notification, &[("duration", secs)])),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::BlockReason;

    #[test]
    fn test_render_template() {
        assert_eq!(
            render_template("Muted for {time}s ({time})", &[("time", 42)]),
            "Muted for 42s (42)"
        );
        assert_eq!(render_template("no placeholders", &[("time", 1)]), "no placeholders");
    }

    #[test]
    fn test_allow_delivers() {
        assert_eq!(
            action_for(&Verdict::Allow, &MessageSettings::default()),
            ChatAction::Deliver
        );
    }

    #[test]
    fn test_mute_notice_has_remaining_time() {
        let action = action_for(
            &Verdict::MuteBlocked { remaining_secs: 200 },
            &MessageSettings::default(),
        );
        assert_eq!(
            action,
            ChatAction::Cancel {
                notice: Some("You are muted for spamming. Time remaining: 200 seconds.".to_string()),
            }
        );
    }

    #[test]
    fn test_blocked_notice_respects_toggle() {
        let mut messages = MessageSettings::default();
        let verdict = Verdict::Blocked(BlockReason::Duplicate);
        assert_eq!(action_for(&verdict, &messages), ChatAction::Cancel { notice: None });

        messages.notify_blocked = true;
        assert_eq!(
            action_for(&verdict, &messages),
            ChatAction::Cancel {
                notice: Some(messages.blocked_notice.clone()),
            }
        );
    }

    #[test]
    fn test_kick_with_escalation_mute() {
        let mut messages = MessageSettings::default();
        let verdict = Verdict::KickFlood {
            muted_for_secs: Some(300),
        };

        match action_for(&verdict, &messages) {
            ChatAction::Kick { reason, mute_notice } => {
                assert_eq!(reason, messages.kick_message);
                assert_eq!(
                    mute_notice.as_deref(),
                    Some("You have been muted for 300 seconds for repeated spamming.")
                );
            }
            other => panic!("expected kick, got {:?}", other),
        }

        messages.notify_mute = false;
        assert!(matches!(
            action_for(&verdict, &messages),
            ChatAction::Kick { mute_notice: None, .. }
        ));
    }

    #[test]
    fn test_plain_kick_has_no_mute_notice() {
        let action = action_for(
            &Verdict::KickFlood {
                muted_for_secs: None,
            },
            &MessageSettings::default(),
        );
        assert!(matches!(action, ChatAction::Kick { mute_notice: None, .. }));
    }
}
