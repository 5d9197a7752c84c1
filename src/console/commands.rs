// Console command parsing.
//
// One command per stdin line. Parsing is pure so the host loop stays thin.

use crate::core::moderation::{SenderId, MAX_DURATION_SECS};
use uuid::Uuid;

/// Everything an operator (or a scripted client) can type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bring a sender online. `None` mints a new id.
    Join(Option<SenderId>),
    /// Take a sender offline
    Quit(SenderId),
    /// A chat message from an online sender
    Chat { sender: SenderId, text: String },
    /// Grant the bypass permission
    Op(SenderId),
    /// Revoke the bypass permission
    Deop(SenderId),
    /// Administrative mute
    Mute { sender: SenderId, duration_secs: u64 },
    Unmute(SenderId),
    /// Overall status, or one sender's state
    Status(Option<SenderId>),
    /// List enforced blocked words
    Words,
    /// Re-read the configuration file
    Reload,
    Help,
    Version,
    Exit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command: {0} (try `help`)")]
    UnknownCommand(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Invalid sender id: {0}")]
    InvalidSender(String),
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

/// (usage, description) for every command, in help order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("join [id]", "Bring a sender online (new id if omitted)"),
    ("quit <id>", "Take a sender offline; pauses any mute"),
    ("chat <id> <text>", "Send a chat message as a sender"),
    ("op <id>", "Grant the bypass permission"),
    ("deop <id>", "Revoke the bypass permission"),
    ("mute <id> <secs>", "Mute a sender"),
    ("unmute <id>", "Lift a sender's mute"),
    ("status [id]", "Show engine status, or one sender's state"),
    ("words", "List enforced blocked words"),
    ("reload", "Re-read the configuration file"),
    ("help", "Show this list"),
    ("version", "Show the version"),
    ("exit", "Save state and stop"),
];

fn sender_arg(arg: Option<&str>, usage: &'static str) -> Result<SenderId, ParseError> {
    let raw = arg.ok_or(ParseError::Usage(usage))?;
    Uuid::parse_str(raw).map_err(|_| ParseError::InvalidSender(raw.to_string()))
}

/// Parse a single input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let command = match name.to_ascii_lowercase().as_str() {
        "join" => match args.next() {
            Some(raw) => Command::Join(Some(
                Uuid::parse_str(raw).map_err(|_| ParseError::InvalidSender(raw.to_string()))?,
            )),
            None => Command::Join(None),
        },
        "quit" => Command::Quit(sender_arg(args.next(), "quit <id>")?),
        "chat" => {
            let usage = "chat <id> <text>";
            let (raw_id, text) = rest.split_once(char::is_whitespace).ok_or(ParseError::Usage(usage))?;
            let sender = sender_arg(Some(raw_id), usage)?;
            let text = text.trim_start();
            if text.is_empty() {
                return Err(ParseError::Usage(usage));
            }
            Command::Chat {
                sender,
                text: text.to_string(),
            }
        }
        "op" => Command::Op(sender_arg(args.next(), "op <id>")?),
        "deop" => Command::Deop(sender_arg(args.next(), "deop <id>")?),
        "mute" => {
            let usage = "mute <id> <secs>";
            let sender = sender_arg(args.next(), usage)?;
            let raw = args.next().ok_or(ParseError::Usage(usage))?;
            let duration_secs = raw
                .parse::<u64>()
                .ok()
                .filter(|secs| (1..=MAX_DURATION_SECS).contains(secs))
                .ok_or_else(|| ParseError::InvalidDuration(raw.to_string()))?;
            Command::Mute {
                sender,
                duration_secs,
            }
        }
        "unmute" => Command::Unmute(sender_arg(args.next(), "unmute <id>")?),
        "status" => match args.next() {
            Some(raw) => Command::Status(Some(sender_arg(Some(raw), "status [id]")?)),
            None => Command::Status(None),
        },
        "words" => Command::Words,
        "reload" => Command::Reload,
        "help" | "?" => Command::Help,
        "version" => Command::Version,
        "exit" | "stop" => Command::Exit,
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };

    Ok(Some(command))
}

/// Help text listing every command.
pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
    let mut out = String::from("Commands:");
    for (usage, description) in COMMANDS {
        out.push_str(&format!("\n  {:<width$}  {}", usage, description, width = width));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    fn id() -> SenderId {
        Uuid::parse_str(ID).unwrap()
    }

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_chat_keeps_text_verbatim() {
        let cmd = parse(&format!("chat {}   hello   there  world", ID)).unwrap();
        assert_eq!(
            cmd,
            Some(Command::Chat {
                sender: id(),
                text: "hello   there  world".to_string(),
            })
        );
    }

    #[test]
    fn test_chat_requires_text() {
        assert_eq!(
            parse(&format!("chat {}", ID)),
            Err(ParseError::Usage("chat <id> <text>"))
        );
    }

    #[test]
    fn test_join_with_and_without_id() {
        assert_eq!(parse("join").unwrap(), Some(Command::Join(None)));
        assert_eq!(
            parse(&format!("JOIN {}", ID)).unwrap(),
            Some(Command::Join(Some(id())))
        );
    }

    #[test]
    fn test_mute_arguments() {
        assert_eq!(
            parse(&format!("mute {} 300", ID)).unwrap(),
            Some(Command::Mute {
                sender: id(),
                duration_secs: 300,
            })
        );
        assert_eq!(
            parse(&format!("mute {} soon", ID)),
            Err(ParseError::InvalidDuration("soon".to_string()))
        );
        assert_eq!(
            parse(&format!("mute {} 0", ID)),
            Err(ParseError::InvalidDuration("0".to_string()))
        );
        assert_eq!(
            parse(&format!("mute {}", ID)),
            Err(ParseError::Usage("mute <id> <secs>"))
        );
    }

    #[test]
    fn test_mute_duration_upper_bound() {
        let ten_years = MAX_DURATION_SECS.to_string();
        assert_eq!(
            parse(&format!("mute {} {}", ID, ten_years)).unwrap(),
            Some(Command::Mute {
                sender: id(),
                duration_secs: MAX_DURATION_SECS,
            })
        );

        for raw in [
            (MAX_DURATION_SECS + 1).to_string(),
            "100000000000000".to_string(),
            u64::MAX.to_string(),
        ] {
            assert_eq!(
                parse(&format!("mute {} {}", ID, raw)),
                Err(ParseError::InvalidDuration(raw))
            );
        }
    }

    #[test]
    fn test_bad_sender_id() {
        assert_eq!(
            parse("quit bob"),
            Err(ParseError::InvalidSender("bob".to_string()))
        );
        assert_eq!(parse("op"), Err(ParseError::Usage("op <id>")));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse("dance now"),
            Err(ParseError::UnknownCommand("dance".to_string()))
        );
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = help_text();
        for (usage, _) in COMMANDS {
            assert!(help.contains(usage), "missing {}", usage);
        }
    }
}
