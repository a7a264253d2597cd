//! Control panel message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::control::{DriveCommand, SpeedLevel};
use crate::events::ControllerEvent;
use crate::state::Mode;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from a panel to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current controller status
    GetStatus,

    /// Select the input mode
    SetMode { mode: Mode },

    /// Press an on-screen drive button
    Press { command: DriveCommand },

    /// Choose a speed level
    SetSpeed { level: SpeedLevel },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to status and event notifications
    Subscribe,
}

/// Responses from the controller to a panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current controller status
    Status(PanelStatus),

    /// Input forwarded to the coordinator
    Accepted,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Pushed to subscribed panels
    Notification(Notification),

    /// Error response
    Error { code: String, message: String },
}

/// Push notification for subscribed panels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The status line changed
    StatusChanged { status: String },

    /// Controller event occurred
    Event { event: ControllerEvent },
}

/// Full controller status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStatus {
    /// Controller version
    pub version: String,

    /// Current mode
    pub mode: Mode,

    /// Whether speech recognition is capturing
    pub listening: bool,

    /// Whether the platform offers speech recognition at all
    pub speech_available: bool,

    /// Rendered status line
    pub status: String,

    /// Uptime in seconds
    pub uptime_secs: u64,
}
