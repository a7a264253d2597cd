//! Mode coordinator
//!
//! Owns the Manual/Voice state machine, attaches and detaches the
//! keyboard and speech sources on transitions, and is the single place
//! inputs are turned into dispatches.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::control::{Command, CommandDispatcher, DispatchHandle, DriveCommand, SpeedLevel};
use crate::events::ControllerEvent;
use crate::keyboard::{DriveKey, KeyboardListener, KeyboardSubscription};
use crate::preferences::{self, PreferenceStore};
use crate::speech::{SpeechEvent, SpeechInput};

use super::mode::Mode;
use super::status::{Status, StatusCell};

/// Inputs funnelled into the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Drive key from the keyboard listener (gated by mode)
    Key(DriveKey),
    /// On-screen drive button (never gated)
    Button(DriveCommand),
    /// Speed selector (manual mode only)
    Speed(SpeedLevel),
    /// Explicit mode selection
    SelectMode(Mode),
    Quit,
}

/// Observable mode state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSnapshot {
    pub mode: Mode,
    /// True while the speech adapter is capturing
    pub listening: bool,
}

/// The coordinator that arbitrates between input sources
pub struct ModeCoordinator {
    /// Current mode
    mode: Mode,
    keyboard: KeyboardListener,
    /// Held only in Manual
    keyboard_subscription: Option<KeyboardSubscription>,
    speech: SpeechInput,
    dispatcher: CommandDispatcher,
    preferences: Arc<dyn PreferenceStore>,
    status: StatusCell,
    snapshot_tx: watch::Sender<ModeSnapshot>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl ModeCoordinator {
    /// Create a coordinator in the persisted mode
    ///
    /// No source is attached until [`ModeCoordinator::mount`].
    pub fn new(
        keyboard: KeyboardListener,
        speech: SpeechInput,
        dispatcher: CommandDispatcher,
        preferences: Arc<dyn PreferenceStore>,
        status: StatusCell,
        event_tx: broadcast::Sender<ControllerEvent>,
    ) -> Self {
        let mode = preferences::load_mode(preferences.as_ref());
        let (snapshot_tx, _) = watch::channel(ModeSnapshot {
            mode,
            listening: false,
        });

        Self {
            mode,
            keyboard,
            keyboard_subscription: None,
            speech,
            dispatcher,
            preferences,
            status,
            snapshot_tx,
            event_tx,
        }
    }

    /// Get the current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether speech is capturing
    ///
    /// Stays true after a recognizer dies on its own; only a transition
    /// out of Voice clears it.
    #[cfg(test)]
    pub fn is_listening(&self) -> bool {
        self.speech.is_listening()
    }

    #[cfg(test)]
    pub fn keyboard(&self) -> &KeyboardListener {
        &self.keyboard
    }

    pub fn speech_available(&self) -> bool {
        self.speech.is_available()
    }

    /// Observe mode and listening changes
    pub fn subscribe(&self) -> watch::Receiver<ModeSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Apply the initial mode's side effects
    pub fn mount(&mut self) {
        info!(mode = %self.mode, "coordinator mounted");
        self.enter(self.mode);
        self.persist();
    }

    /// Select a mode; returns false when it was already active
    pub fn select_mode(&mut self, mode: Mode) -> bool {
        let previous = self.mode;
        if mode == previous {
            debug!(%mode, "mode already active");
            return false;
        }

        info!(from = %previous, to = %mode, "mode transition");
        self.mode = mode;
        self.enter(mode);
        self.persist();

        let _ = self.event_tx.send(ControllerEvent::ModeChanged { mode, previous });
        true
    }

    /// Attach the sources for `mode` and detach the others
    fn enter(&mut self, mode: Mode) {
        match mode {
            Mode::Voice => {
                // detach keys before speech starts so both are never live
                self.keyboard_subscription = None;
                match self.speech.start() {
                    Ok(()) => self.status.set(Status::Listening),
                    Err(e) => {
                        warn!(error = %e, "speech input failed to start");
                        self.report_recognition_error(e.to_string());
                    }
                }
            }
            Mode::Manual => {
                self.speech.stop();
                if self.keyboard_subscription.is_none() {
                    self.keyboard_subscription = Some(self.keyboard.subscribe());
                }
                self.status.set(Status::Idle);
            }
        }

        self.snapshot_tx.send_replace(ModeSnapshot {
            mode,
            listening: self.speech.is_listening(),
        });
    }

    fn persist(&self) {
        if let Err(e) = preferences::save_mode(self.preferences.as_ref(), self.mode) {
            warn!(error = %e, mode = %self.mode, "failed to persist mode");
        }
    }

    fn report_recognition_error(&self, error: String) {
        self.status.set(Status::RecognitionError(error.clone()));
        let _ = self.event_tx.send(ControllerEvent::RecognitionFailed { error });
    }

    /// Handle one input; returns the dispatch it started, if any
    pub fn handle_input(&mut self, input: InputEvent) -> Option<DispatchHandle> {
        match input {
            InputEvent::Key(key) => {
                if self.mode != Mode::Manual {
                    debug!(?key, "drive key ignored in voice mode");
                    return None;
                }
                Some(self.dispatcher.send(&Command::manual(key.command())))
            }
            InputEvent::Button(drive) => Some(self.dispatcher.send(&Command::manual(drive))),
            InputEvent::Speed(level) => {
                if self.mode != Mode::Manual {
                    debug!(%level, "speed selector ignored in voice mode");
                    return None;
                }
                Some(self.dispatcher.send(&Command::speed(level)))
            }
            InputEvent::SelectMode(mode) => {
                self.select_mode(mode);
                None
            }
            InputEvent::Quit => None,
        }
    }

    /// Handle output from the speech adapter
    pub fn handle_speech(&mut self, event: SpeechEvent) -> Option<DispatchHandle> {
        match event {
            SpeechEvent::Utterance(text) => {
                if self.mode != Mode::Voice {
                    debug!(%text, "utterance ignored in manual mode");
                    return None;
                }
                info!(%text, "heard");
                let _ = self
                    .event_tx
                    .send(ControllerEvent::UtteranceHeard { text: text.clone() });
                Some(self.dispatcher.send(&Command::voice(text)))
            }
            SpeechEvent::Error(error) => {
                warn!(%error, "speech recognition error");
                self.report_recognition_error(error);
                None
            }
        }
    }

    /// Run until a quit input arrives or the input channel closes
    pub async fn run(
        &mut self,
        mut input_rx: mpsc::Receiver<InputEvent>,
        mut speech_rx: mpsc::Receiver<SpeechEvent>,
    ) {
        info!(mode = %self.mode, "coordinator started");

        loop {
            tokio::select! {
                input = input_rx.recv() => match input {
                    Some(InputEvent::Quit) => {
                        info!("quit requested");
                        break;
                    }
                    Some(input) => {
                        self.handle_input(input);
                    }
                    None => break,
                },
                Some(event) = speech_rx.recv() => {
                    self.handle_speech(event);
                }
            }
        }

        info!("coordinator stopped");
    }

    /// Detach every input source
    pub fn shutdown(&mut self) {
        self.speech.stop();
        self.keyboard_subscription = None;
        self.keyboard.stop();
        self.snapshot_tx.send_replace(ModeSnapshot {
            mode: self.mode,
            listening: false,
        });
    }
}
