//! Speech input adapter
//!
//! Wraps the detected capability with idempotent start/stop and delivers
//! normalized utterances to the coordinator. When the capability is
//! unavailable every operation is a no-op.

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::capability::{SpeechCapability, SpeechError};

/// What the adapter delivers to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// A final utterance, trimmed and lower-cased
    Utterance(String),
    /// The recognizer reported a problem
    Error(String),
}

/// Where a recognizer sends its output
#[derive(Clone)]
pub struct UtteranceSink {
    tx: mpsc::Sender<SpeechEvent>,
}

impl UtteranceSink {
    pub fn new(tx: mpsc::Sender<SpeechEvent>) -> Self {
        Self { tx }
    }

    /// Deliver a raw final transcript; returns false once the receiver is gone
    pub async fn transcript(&self, raw: &str) -> bool {
        match normalize_utterance(raw) {
            Some(text) => self.tx.send(SpeechEvent::Utterance(text)).await.is_ok(),
            None => {
                debug!("empty transcript dropped");
                !self.tx.is_closed()
            }
        }
    }

    /// Deliver a recognition error
    pub async fn error(&self, error: String) -> bool {
        self.tx.send(SpeechEvent::Error(error)).await.is_ok()
    }
}

/// Trim and lower-case a transcript, dropping it when nothing is left
pub fn normalize_utterance(raw: &str) -> Option<String> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The speech input adapter
///
/// Constructed once and reused across mode toggles.
pub struct SpeechInput {
    capability: SpeechCapability,
    sink: UtteranceSink,
    listening: bool,
}

impl SpeechInput {
    pub fn new(capability: SpeechCapability, events_tx: mpsc::Sender<SpeechEvent>) -> Self {
        if let SpeechCapability::Unavailable { reason } = &capability {
            info!(%reason, "speech input disabled");
        }
        Self {
            capability,
            sink: UtteranceSink::new(events_tx),
            listening: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.capability.is_available()
    }

    /// True while a recognition session is started
    ///
    /// A recognizer that exits on its own leaves this set until `stop`, so
    /// it can report listening while nothing is capturing.
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Start listening; a no-op if already listening or unavailable
    pub fn start(&mut self) -> Result<(), SpeechError> {
        if self.listening {
            debug!("speech input already listening");
            return Ok(());
        }

        match &mut self.capability {
            SpeechCapability::Available(recognizer) => {
                recognizer.start(self.sink.clone())?;
                self.listening = true;
                info!(recognizer = recognizer.name(), "speech input listening");
            }
            SpeechCapability::Unavailable { .. } => {
                debug!("speech input unavailable, start ignored");
            }
        }
        Ok(())
    }

    /// Stop listening; a no-op if not listening
    pub fn stop(&mut self) {
        if !self.listening {
            return;
        }

        if let SpeechCapability::Available(recognizer) = &mut self.capability {
            recognizer.stop();
            info!(recognizer = recognizer.name(), "speech input stopped");
        }
        self.listening = false;
    }
}
