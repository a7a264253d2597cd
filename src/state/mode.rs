//! Input mode definitions

use serde::{Deserialize, Serialize};

/// Which input source drives the bot besides the always-available buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Arrow keys and speed selector are active
    Manual,
    /// Continuous speech recognition is active
    Voice,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Manual
    }
}

impl Mode {
    /// Name used in the preference store
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Voice => "voice",
        }
    }

    /// Parse a stored mode name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "manual" => Some(Mode::Manual),
            "voice" => Some(Mode::Voice),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Manual => write!(f, "Manual"),
            Mode::Voice => write!(f, "Voice"),
        }
    }
}
