//! Command values sent to the remote control API
//!
//! A command is built from a raw input, sent once, and discarded.
//! Voice-origin commands are tagged with the `voice:` prefix on the wire.

use serde::{Deserialize, Serialize};

/// Prefix applied to voice-origin commands before transmission
pub const VOICE_PREFIX: &str = "voice:";

/// Fixed drive commands available from buttons and arrow keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl DriveCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveCommand::Forward => "forward",
            DriveCommand::Backward => "backward",
            DriveCommand::Left => "left",
            DriveCommand::Right => "right",
            DriveCommand::Stop => "stop",
        }
    }
}

impl std::fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speed levels offered by the speed selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedLevel {
    Slow,
    Medium,
    Fast,
}

impl SpeedLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedLevel::Slow => "slow",
            SpeedLevel::Medium => "medium",
            SpeedLevel::Fast => "fast",
        }
    }
}

impl std::fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a command asks the bot to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Drive(DriveCommand),
    Speed(SpeedLevel),
    /// Free text from speech recognition, forwarded without parsing
    Utterance(String),
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandKind::Drive(drive) => write!(f, "{}", drive),
            CommandKind::Speed(level) => write!(f, "speed-{}", level),
            CommandKind::Utterance(text) => f.write_str(text),
        }
    }
}

/// An immutable command ready to be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    is_voice: bool,
}

impl Command {
    /// A button or keyboard drive command
    pub fn manual(drive: DriveCommand) -> Self {
        Self {
            kind: CommandKind::Drive(drive),
            is_voice: false,
        }
    }

    /// A speed selector command
    pub fn speed(level: SpeedLevel) -> Self {
        Self {
            kind: CommandKind::Speed(level),
            is_voice: false,
        }
    }

    /// A recognized utterance
    pub fn voice(utterance: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Utterance(utterance.into()),
            is_voice: true,
        }
    }

    pub fn is_voice(&self) -> bool {
        self.is_voice
    }

    /// The raw command text, before any voice tagging
    pub fn raw(&self) -> String {
        self.kind.to_string()
    }

    /// The string placed in the `cmd` field of the request body
    #[cfg(test)]
    pub fn wire(&self) -> String {
        wire_command(&self.raw(), self.is_voice)
    }
}

/// Build the wire command for a raw input
pub fn wire_command(raw: &str, is_voice: bool) -> String {
    if is_voice {
        format!("{VOICE_PREFIX}{raw}")
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_commands_sent_verbatim() {
        for raw in ["forward", "backward", "left", "right", "stop", "speed-slow"] {
            assert_eq!(wire_command(raw, false), raw);
        }
    }

    #[test]
    fn test_voice_commands_prefixed() {
        assert_eq!(wire_command("turn left", true), "voice:turn left");
        assert_eq!(wire_command("", true), "voice:");
        // already-prefixed text is not special-cased
        assert_eq!(wire_command("voice:go", true), "voice:voice:go");
    }

    #[test]
    fn test_command_wire_forms() {
        assert_eq!(Command::manual(DriveCommand::Backward).wire(), "backward");
        assert_eq!(Command::speed(SpeedLevel::Fast).wire(), "speed-fast");

        let voice = Command::voice("stop the bot");
        assert!(voice.is_voice());
        assert_eq!(voice.raw(), "stop the bot");
        assert_eq!(voice.wire(), "voice:stop the bot");
    }

    #[test]
    fn test_drive_command_serialization() {
        let json = serde_json::to_string(&DriveCommand::Forward).unwrap();
        assert_eq!(json, r#""forward""#);
        let level: SpeedLevel = serde_json::from_str(r#""fast""#).unwrap();
        assert_eq!(level, SpeedLevel::Fast);
    }
}
