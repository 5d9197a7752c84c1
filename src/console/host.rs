// Console host - stands in for a chat server.
//
// Tracks who is online and who holds the bypass permission, feeds lifecycle
// signals and messages into the pipeline, and turns results into output lines.

use super::chat_handler::{action_for, render_template, ChatAction};
use super::commands::{help_text, Command};
use crate::core::moderation::{ModerationConfig, ModerationPipeline, SenderId, Verdict};
use anyhow::Context;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub struct ConsoleHost {
    pipeline: Arc<ModerationPipeline>,
    config_path: PathBuf,
    online: DashSet<SenderId>,
    operators: DashSet<SenderId>,
}

impl ConsoleHost {
    pub fn new(pipeline: Arc<ModerationPipeline>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            config_path: config_path.into(),
            online: DashSet::new(),
            operators: DashSet::new(),
        }
    }

    pub fn is_online(&self, sender: SenderId) -> bool {
        self.online.contains(&sender)
    }

    /// Run one command. Errors are faults (e.g. an unreadable config on
    /// reload); moderation outcomes are ordinary output lines.
    pub async fn handle(&self, command: Command, now: DateTime<Utc>) -> anyhow::Result<Vec<String>> {
        let lines = match command {
            Command::Join(sender) => self.join(sender.unwrap_or_else(Uuid::new_v4), now),
            Command::Quit(sender) => {
                if self.disconnect(sender, now) {
                    vec![format!("{} left", sender)]
                } else {
                    vec![format!("{} is not online", sender)]
                }
            }
            Command::Chat { sender, text } => self.chat(sender, &text, now),
            Command::Op(sender) => {
                self.operators.insert(sender);
                let bypass = self.pipeline.config().permissions.bypass.clone();
                vec![format!("Granted {} to {}", bypass, sender)]
            }
            Command::Deop(sender) => {
                let bypass = self.pipeline.config().permissions.bypass.clone();
                if self.operators.remove(&sender).is_some() {
                    vec![format!("Revoked {} from {}", bypass, sender)]
                } else {
                    vec![format!("{} does not hold {}", sender, bypass)]
                }
            }
            Command::Mute {
                sender,
                duration_secs,
            } => self.mute(sender, duration_secs, now),
            Command::Unmute(sender) => {
                if self.pipeline.mutes().unmute(sender) {
                    vec![format!("Unmuted {}", sender)]
                } else {
                    vec![format!("{} is not muted", sender)]
                }
            }
            Command::Status(Some(sender)) => self.sender_status(sender, now),
            Command::Status(None) => self.status(),
            Command::Words => {
                let words = self.pipeline.words().blocked_words();
                if words.is_empty() {
                    vec!["No blocked words are enforced".to_string()]
                } else {
                    vec![format!("Blocked words ({}): {}", words.len(), words.join(", "))]
                }
            }
            Command::Reload => self.reload().await?,
            Command::Help => vec![help_text()],
            Command::Version => vec![format!(
                "{} {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            )],
            Command::Exit => {
                let online: Vec<SenderId> = self.online.iter().map(|s| *s).collect();
                for sender in &online {
                    self.disconnect(*sender, now);
                }
                vec![format!("Shutting down ({} senders disconnected)", online.len())]
            }
        };
        Ok(lines)
    }

    fn join(&self, sender: SenderId, now: DateTime<Utc>) -> Vec<String> {
        if !self.online.insert(sender) {
            return vec![format!("{} is already online", sender)];
        }
        self.pipeline.on_connect(sender, now);

        let mut lines = vec![format!("{} joined", sender)];
        if let Some(left) = self.pipeline.mutes().muted_remaining(sender, now) {
            lines.push(format!("{} is still muted ({}s left)", sender, left));
        }
        lines
    }

    fn disconnect(&self, sender: SenderId, now: DateTime<Utc>) -> bool {
        if self.online.remove(&sender).is_none() {
            return false;
        }
        self.pipeline.on_disconnect(sender, now);
        true
    }

    fn chat(&self, sender: SenderId, text: &str, now: DateTime<Utc>) -> Vec<String> {
        if !self.is_online(sender) {
            return vec![format!("{} is not online; join first", sender)];
        }

        let has_bypass = self.operators.contains(&sender);
        let verdict = self.pipeline.evaluate(sender, text, has_bypass, now);
        let config = self.pipeline.config();

        match action_for(&verdict, &config.messages) {
            ChatAction::Deliver => vec![format!("<{}> {}", sender, text)],
            ChatAction::Cancel { notice } => {
                let mut lines = vec![format!(
                    "[cancelled] message from {} ({})",
                    sender,
                    describe(&verdict)
                )];
                lines.extend(notice.map(|n| format!("-> {}: {}", sender, n)));
                lines
            }
            ChatAction::Kick {
                reason,
                mute_notice,
            } => {
                tracing::info!(sender = %sender, verdict = ?verdict, "Kicking sender for flooding");
                // Notice goes out before the kick; afterwards there is nobody to tell.
                let mut lines: Vec<String> =
                    mute_notice.map(|n| format!("-> {}: {}", sender, n)).into_iter().collect();
                self.disconnect(sender, now);
                lines.push(format!("[kicked] {}: {}", sender, reason));
                lines
            }
        }
    }

    fn mute(&self, sender: SenderId, duration_secs: u64, now: DateTime<Utc>) -> Vec<String> {
        let mutes = self.pipeline.mutes();
        let duration_secs = mutes.mute(sender, duration_secs, now).original_duration_secs;
        if !self.is_online(sender) {
            // Offline senders don't serve time until they come back
            mutes.on_disconnect(sender, now);
        }
        tracing::info!(sender = %sender, duration_secs, "Muted by console");

        let config = self.pipeline.config();
        let mut lines = vec![format!("Muted {} for {}s", sender, duration_secs)];
        if config.messages.notify_mute && self.is_online(sender) {
            lines.push(format!(
                "-> {}: {}",
                sender,
                render_template(
                    &config.messages.muted_notification,
                    &[("duration", duration_secs)]
                )
            ));
        }
        lines
    }

    fn sender_status(&self, sender: SenderId, now: DateTime<Utc>) -> Vec<String> {
        let mutes = self.pipeline.mutes();
        let mute = if mutes.is_muted(sender, now) {
            match mutes.record(sender) {
                Some(record) if record.is_paused() => format!(
                    "muted, paused with {}s left (of {}s)",
                    record.remaining_secs(now),
                    record.original_duration_secs
                ),
                Some(record) => format!(
                    "muted, {}s left (of {}s)",
                    record.remaining_secs(now),
                    record.original_duration_secs
                ),
                None => "not muted".to_string(),
            }
        } else {
            "not muted".to_string()
        };

        vec![
            format!("{}:", sender),
            format!("  online: {}", self.is_online(sender)),
            format!("  bypass: {}", self.operators.contains(&sender)),
            format!("  mute: {}", mute),
            format!("  flood violations: {}", self.pipeline.flood_violations(sender)),
        ]
    }

    fn status(&self) -> Vec<String> {
        let config = self.pipeline.config();
        vec![
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            format!("  online: {}", self.online.len()),
            format!("  bypass holders: {}", self.operators.len()),
            format!("  active mutes: {}", self.pipeline.mutes().len()),
            format!("  duplicate histories: {}", self.pipeline.tracked_senders()),
            format!(
                "  flood: {} ({} msgs / {}s)",
                on_off(config.flood.enabled),
                config.flood.message_threshold,
                config.flood.time_window_secs
            ),
            format!(
                "  auto-mute: {} ({} kicks / {}m -> {}s)",
                on_off(config.auto_mute.enabled),
                config.auto_mute.kick_threshold,
                config.auto_mute.kick_window_minutes,
                config.auto_mute.mute_duration_secs
            ),
            format!(
                "  duplicates: {} repeats at {}% within {}s",
                config.duplicate_messages.max_repeats,
                config.general.similarity_threshold,
                config.duplicate_messages.cooldown_secs
            ),
            format!(
                "  blocked words: {} ({} enforced)",
                on_off(config.blocked_words.enabled),
                self.pipeline.words().blocked_words().len()
            ),
        ]
    }

    async fn reload(&self) -> anyhow::Result<Vec<String>> {
        let config = ModerationConfig::load(&self.config_path).with_context(|| {
            format!(
                "Failed to reload {}; keeping current configuration",
                self.config_path.display()
            )
        })?;
        self.pipeline.reload(config).await;
        Ok(vec![format!(
            "Configuration reloaded ({} blocked words, {} mutes)",
            self.pipeline.words().blocked_words().len(),
            self.pipeline.mutes().len()
        )])
    }
}

fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Allow => "allowed".to_string(),
        Verdict::Blocked(reason) => reason.to_string(),
        Verdict::MuteBlocked { remaining_secs } => format!("muted, {}s left", remaining_secs),
        Verdict::KickFlood { .. } => "flood".to_string(),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{MuteLedger, MAX_DURATION_SECS};
    use crate::infra::moderation::InMemoryMuteStore;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    async fn host(config: ModerationConfig, dir: &TempDir) -> ConsoleHost {
        let ledger = Arc::new(MuteLedger::load(Arc::new(InMemoryMuteStore::new())).await);
        let pipeline = Arc::new(ModerationPipeline::new(config, ledger));
        ConsoleHost::new(pipeline, dir.path().join("chat_guard.json"))
    }

    #[tokio::test]
    async fn test_chat_requires_join() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;
        let sender = Uuid::new_v4();

        let out = host
            .handle(
                Command::Chat {
                    sender,
                    text: "hello".to_string(),
                },
                t0(),
            )
            .await
            .unwrap();
        assert!(out[0].contains("not online"));

        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();
        let out = host
            .handle(
                Command::Chat {
                    sender,
                    text: "hello".to_string(),
                },
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(out, vec![format!("<{}> hello", sender)]);
    }

    #[tokio::test]
    async fn test_flood_kick_disconnects() {
        let dir = TempDir::new().unwrap();
        let mut config = ModerationConfig::default();
        config.flood.message_threshold = 3;
        let host = host(config, &dir).await;
        let sender = Uuid::new_v4();
        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();

        let texts = ["good morning", "anyone around?", "what's for lunch"];
        let mut last = Vec::new();
        for text in texts {
            last = host
                .handle(
                    Command::Chat {
                        sender,
                        text: text.to_string(),
                    },
                    t0(),
                )
                .await
                .unwrap();
        }

        assert!(last.iter().any(|l| l.starts_with("[kicked]")));
        assert!(!host.is_online(sender));
    }

    #[tokio::test]
    async fn test_operator_bypasses_blocked_words() {
        let dir = TempDir::new().unwrap();
        let mut config = ModerationConfig::default();
        config.blocked_words.words = vec!["spoon".to_string()];
        let host = host(config, &dir).await;
        let sender = Uuid::new_v4();
        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();

        let chat = || Command::Chat {
            sender,
            text: "hand me the sp00n".to_string(),
        };
        let out = host.handle(chat(), t0()).await.unwrap();
        assert!(out[0].starts_with("[cancelled]"));

        host.handle(Command::Op(sender), t0()).await.unwrap();
        let out = host.handle(chat(), t0()).await.unwrap();
        assert!(out[0].starts_with('<'));
    }

    #[tokio::test]
    async fn test_offline_mute_is_paused() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;
        let sender = Uuid::new_v4();

        host.handle(
            Command::Mute {
                sender,
                duration_secs: 120,
            },
            t0(),
        )
        .await
        .unwrap();

        // time spent offline doesn't count
        let later = t0() + Duration::seconds(600);
        let out = host.handle(Command::Join(Some(sender)), later).await.unwrap();
        assert!(out.iter().any(|l| l.contains("120s left")));

        let out = host
            .handle(
                Command::Chat {
                    sender,
                    text: "let me talk".to_string(),
                },
                later,
            )
            .await
            .unwrap();
        assert!(out[0].starts_with("[cancelled]"));
        assert!(out[1].contains("Time remaining: 120 seconds"));
    }

    #[tokio::test]
    async fn test_exit_pauses_online_mutes() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;
        let sender = Uuid::new_v4();
        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();
        host.handle(
            Command::Mute {
                sender,
                duration_secs: 60,
            },
            t0(),
        )
        .await
        .unwrap();

        host.handle(Command::Exit, t0() + Duration::seconds(10))
            .await
            .unwrap();

        assert!(!host.is_online(sender));
        let record = host.pipeline.mutes().record(sender).unwrap();
        assert!(record.is_paused());
        assert_eq!(record.remaining_secs(t0()), 50);
    }

    #[tokio::test]
    async fn test_reload_applies_new_words() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;

        let mut config = ModerationConfig::default();
        config.blocked_words.words = vec!["spoon".to_string(), "ladle".to_string()];
        std::fs::write(
            dir.path().join("chat_guard.json"),
            serde_json::to_string(&config).unwrap(),
        )
        .unwrap();

        host.handle(Command::Reload, t0()).await.unwrap();
        let out = host.handle(Command::Words, t0()).await.unwrap();
        assert!(out[0].contains("spoon"));
        assert!(out[0].contains("ladle"));
    }

    #[tokio::test]
    async fn test_bad_reload_keeps_config() {
        let dir = TempDir::new().unwrap();
        let mut config = ModerationConfig::default();
        config.blocked_words.words = vec!["spoon".to_string()];
        let host = host(config, &dir).await;
        std::fs::write(dir.path().join("chat_guard.json"), "{ nope").unwrap();

        assert!(host.handle(Command::Reload, t0()).await.is_err());
        let out = host.handle(Command::Words, t0()).await.unwrap();
        assert!(out[0].contains("spoon"));
    }

    #[tokio::test]
    async fn test_oversized_mute_is_capped() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;
        let sender = Uuid::new_v4();
        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();

        let out = host
            .handle(
                Command::Mute {
                    sender,
                    duration_secs: u64::MAX,
                },
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(out[0], format!("Muted {} for {}s", sender, MAX_DURATION_SECS));

        let out = host
            .handle(
                Command::Chat {
                    sender,
                    text: "let me talk".to_string(),
                },
                t0() + Duration::days(365),
            )
            .await
            .unwrap();
        assert!(out[0].starts_with("[cancelled]"));
    }

    #[tokio::test]
    async fn test_reload_caps_huge_durations() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;
        std::fs::write(
            dir.path().join("chat_guard.json"),
            r#"{
                "duplicate_messages": { "cooldown_secs": 18446744073709551615 },
                "flood": { "time_window_secs": 18446744073709551615 },
                "auto_mute": { "kick_window_minutes": 18446744073709551615 }
            }"#,
        )
        .unwrap();
        host.handle(Command::Reload, t0()).await.unwrap();
        assert_eq!(host.pipeline.config().flood.time_window_secs, MAX_DURATION_SECS);

        let sender = Uuid::new_v4();
        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();
        let out = host
            .handle(
                Command::Chat {
                    sender,
                    text: "hello".to_string(),
                },
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(out, vec![format!("<{}> hello", sender)]);
        host.pipeline.sweep(t0() + Duration::days(1));
    }

    #[tokio::test]
    async fn test_sender_status() {
        let dir = TempDir::new().unwrap();
        let host = host(ModerationConfig::default(), &dir).await;
        let sender = Uuid::new_v4();
        host.handle(Command::Join(Some(sender)), t0()).await.unwrap();
        host.handle(
            Command::Mute {
                sender,
                duration_secs: 30,
            },
            t0(),
        )
        .await
        .unwrap();

        let out = host.handle(Command::Status(Some(sender)), t0()).await.unwrap();
        assert!(out.iter().any(|l| l.contains("online: true")));
        assert!(out.iter().any(|l| l.contains("muted, 30s left (of 30s)")));

        host.handle(Command::Unmute(sender), t0()).await.unwrap();
        let out = host.handle(Command::Status(Some(sender)), t0()).await.unwrap();
        assert!(out.iter().any(|l| l.contains("mute: not muted")));
    }
}
