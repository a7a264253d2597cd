//! Events module for controller activity
//!
//! Provides structured event types for mode transitions, command
//! dispatch, speech recognition, and state polling.

use serde::{Deserialize, Serialize};

use crate::state::Mode;

/// Events emitted by the controller components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// Input mode switched
    ModeChanged { mode: Mode, previous: Mode },

    /// A command request was issued
    CommandDispatched {
        /// Wire command, including any `voice:` prefix
        command: String,
        is_voice: bool,
    },

    /// A command request finished
    CommandCompleted { command: String, success: bool },

    /// Speech recognition produced an utterance
    UtteranceHeard { text: String },

    /// Speech recognition reported an error
    RecognitionFailed { error: String },

    /// A state poll finished; `status` is absent when the poll failed
    StatePolled { status: Option<String> },
}

impl std::fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerEvent::ModeChanged { mode, previous } => {
                write!(f, "MODE_CHANGED ({} -> {})", previous, mode)
            }
            ControllerEvent::CommandDispatched { command, .. } => {
                write!(f, "COMMAND_DISPATCHED ({})", command)
            }
            ControllerEvent::CommandCompleted { command, success } => {
                let outcome = if *success { "ok" } else { "failed" };
                write!(f, "COMMAND_COMPLETED ({}, {})", command, outcome)
            }
            ControllerEvent::UtteranceHeard { text } => write!(f, "UTTERANCE_HEARD ({})", text),
            ControllerEvent::RecognitionFailed { error } => {
                write!(f, "RECOGNITION_FAILED ({})", error)
            }
            ControllerEvent::StatePolled { status: Some(status) } => {
                write!(f, "STATE_POLLED ({})", status)
            }
            ControllerEvent::StatePolled { status: None } => write!(f, "STATE_POLLED (failed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ControllerEvent::CommandDispatched {
            command: "voice:go".to_string(),
            is_voice: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("command_dispatched"));
        assert!(json.contains("voice:go"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"mode_changed","mode":"voice","previous":"manual"}"#;
        let event: ControllerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            ControllerEvent::ModeChanged {
                mode: Mode::Voice,
                previous: Mode::Manual
            }
        );
    }

    #[test]
    fn test_event_display() {
        let event = ControllerEvent::StatePolled { status: None };
        assert_eq!(event.to_string(), "STATE_POLLED (failed)");
    }
}
