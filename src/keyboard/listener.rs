//! Terminal keyboard listener using crossterm
//!
//! Reads key events on a dedicated thread. Drive keys are forwarded only
//! while a [`KeyboardSubscription`] is held; chrome keys always are.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::state::InputEvent;

use super::keys::{classify, KeyAction};

/// How long a terminal poll blocks before re-checking the running flag
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Keyboard listener feeding the coordinator's input channel
pub struct KeyboardListener {
    input_tx: mpsc::Sender<InputEvent>,
    running: Arc<AtomicBool>,
    subscribers: Arc<AtomicUsize>,
}

impl KeyboardListener {
    /// Create a new keyboard listener
    pub fn new(input_tx: mpsc::Sender<InputEvent>) -> Self {
        Self {
            input_tx,
            running: Arc::new(AtomicBool::new(false)),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start reading the terminal
    ///
    /// Spawns a dedicated thread that polls for key events until `stop()`
    /// is called or the input channel closes.
    pub fn start(&self) -> Result<(), KeyboardError> {
        if !std::io::stdin().is_terminal() {
            return Err(KeyboardError::NotATerminal);
        }

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(KeyboardError::AlreadyRunning);
        }

        let input_tx = self.input_tx.clone();
        let running = Arc::clone(&self.running);
        let subscribers = Arc::clone(&self.subscribers);

        thread::Builder::new()
            .name("keyboard-listener".to_string())
            .spawn(move || {
                info!("keyboard listener thread started");

                if let Err(e) = run_event_loop(&input_tx, &running, &subscribers) {
                    error!(?e, "keyboard listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("keyboard listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                KeyboardError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop the listener thread
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener thread is running
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Attach drive keys until the returned guard is dropped
    pub fn subscribe(&self) -> KeyboardSubscription {
        self.subscribers.fetch_add(1, Ordering::SeqCst);
        debug!("keyboard drive keys attached");
        KeyboardSubscription {
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Whether drive keys are currently forwarded
    #[cfg(test)]
    pub fn is_attached(&self) -> bool {
        self.subscribers.load(Ordering::SeqCst) > 0
    }
}

/// Scoped attachment of the drive keys
pub struct KeyboardSubscription {
    subscribers: Arc<AtomicUsize>,
}

impl Drop for KeyboardSubscription {
    fn drop(&mut self) {
        self.subscribers.fetch_sub(1, Ordering::SeqCst);
        debug!("keyboard drive keys detached");
    }
}

/// Errors that can occur in the keyboard listener
#[derive(Debug, thiserror::Error)]
pub enum KeyboardError {
    #[error("keyboard listener is already running")]
    AlreadyRunning,

    #[error("stdin is not a terminal")]
    NotATerminal,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("terminal read failed: {0}")]
    Terminal(#[from] std::io::Error),
}

/// Poll the terminal and forward classified keys
fn run_event_loop(
    input_tx: &mpsc::Sender<InputEvent>,
    running: &AtomicBool,
    subscribers: &AtomicUsize,
) -> Result<(), KeyboardError> {
    while running.load(Ordering::SeqCst) {
        if !event::poll(POLL_TIMEOUT)? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };

        let input = match classify(&key) {
            Some(KeyAction::Drive(drive)) => {
                if subscribers.load(Ordering::SeqCst) == 0 {
                    debug!(?drive, "drive key ignored while detached");
                    continue;
                }
                InputEvent::Key(drive)
            }
            Some(KeyAction::SelectMode(mode)) => InputEvent::SelectMode(mode),
            Some(KeyAction::Speed(level)) => InputEvent::Speed(level),
            Some(KeyAction::Quit) => InputEvent::Quit,
            None => continue,
        };

        // We use blocking_send since we're not in an async context
        if input_tx.blocking_send(input).is_err() {
            warn!("failed to send key event - channel closed?");
            break;
        }
    }

    Ok(())
}
