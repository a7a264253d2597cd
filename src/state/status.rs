//! The single displayed status value
//!
//! Dispatch completions and poll completions both write here. Writes are
//! last-write-wins in arrival order; nothing is queued or reordered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::trace;

/// What the status line currently shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Status {
    Idle,
    /// A command is in flight
    Sending(String),
    /// A command was accepted by the remote API
    Sent(String),
    CommandFailed,
    Listening,
    RecognitionError(String),
    /// Latest polled remote state
    Current(String),
    StateFetchFailed,
}

impl Default for Status {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Sending(cmd) => write!(f, "Sending: {}", cmd),
            Status::Sent(cmd) => write!(f, "✅ {} sent", cmd.to_uppercase()),
            Status::CommandFailed => write!(f, "❌ Command Failed"),
            Status::Listening => write!(f, "🎤 Listening..."),
            Status::RecognitionError(e) => write!(f, "🎤 Error: {}", e),
            Status::Current(state) => write!(f, "📡 Current: {}", state),
            Status::StateFetchFailed => write!(f, "⚠️ Failed to fetch state"),
        }
    }
}

/// Shared handle to the status value
///
/// Cloning is cheap; every clone writes to the same value. After
/// [`StatusCell::close`] all writes are dropped.
#[derive(Clone)]
pub struct StatusCell {
    tx: Arc<watch::Sender<Status>>,
    closed: Arc<AtomicBool>,
}

impl StatusCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Status::Idle);
        Self {
            tx: Arc::new(tx),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overwrite the status
    pub fn set(&self, status: Status) {
        if self.closed.load(Ordering::SeqCst) {
            trace!(%status, "status write after close dropped");
            return;
        }
        self.tx.send_replace(status);
    }

    /// Current status
    pub fn get(&self) -> Status {
        self.tx.borrow().clone()
    }

    /// Observe status changes
    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }

    /// Stop accepting writes
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
