//! Speech recognition capability
//!
//! Whether recognition exists on this machine is decided once, when the
//! capability is detected. The available backend is an external process
//! that prints one final transcript per stdout line and keeps listening
//! until it is killed.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::adapter::UtteranceSink;

/// Environment variable carrying the recognition language to the backend
pub const LANGUAGE_ENV: &str = "RC_SPEECH_LANG";

/// Errors from the speech recognition backend
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("invalid speech command: {0}")]
    InvalidCommand(String),

    #[error("speech recognizer not found: {0}")]
    ProgramNotFound(String),

    #[error("failed to start speech recognizer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("speech recognizer has no output stream")]
    MissingStdout,
}

/// A continuous speech recognizer
pub trait Recognizer: Send {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Begin a recognition session delivering into `sink`
    fn start(&mut self, sink: UtteranceSink) -> Result<(), SpeechError>;

    /// End the current session; nothing from it is delivered afterwards
    ///
    /// A backend that dies on its own reports through the sink's error
    /// path but is not considered stopped until this is called.
    fn stop(&mut self);
}

/// Speech recognition as provided (or not) by the platform
pub enum SpeechCapability {
    Available(Box<dyn Recognizer>),
    Unavailable { reason: String },
}

impl SpeechCapability {
    /// Detect the capability from the configured recognizer command line
    pub fn detect(command_line: Option<&str>, language: &str) -> Self {
        let Some(command_line) = command_line else {
            return Self::Unavailable {
                reason: "no speech recognizer configured".to_string(),
            };
        };

        match ProcessRecognizer::from_command_line(command_line, language) {
            Ok(recognizer) => {
                info!(program = %recognizer.program.display(), "speech recognizer available");
                Self::Available(Box::new(recognizer))
            }
            Err(e) => {
                warn!(error = %e, "speech recognition unavailable");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Recognizer backed by an external process
pub struct ProcessRecognizer {
    program: PathBuf,
    args: Vec<String>,
    language: String,
    session: Option<Session>,
}

/// One running recognizer process
struct Session {
    /// Set by `stop`; the reader delivers nothing after it
    stopped: Arc<AtomicBool>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ProcessRecognizer {
    /// Parse a shell-style command line and resolve its program on `PATH`
    pub fn from_command_line(command_line: &str, language: &str) -> Result<Self, SpeechError> {
        let mut words = shell_words::split(command_line)
            .map_err(|e| SpeechError::InvalidCommand(e.to_string()))?;
        if words.is_empty() {
            return Err(SpeechError::InvalidCommand("empty command".to_string()));
        }

        let program_name = words.remove(0);
        let program = which::which(&program_name)
            .map_err(|_| SpeechError::ProgramNotFound(program_name.clone()))?;

        Ok(Self {
            program,
            args: words,
            language: language.to_string(),
            session: None,
        })
    }
}

impl Recognizer for ProcessRecognizer {
    fn name(&self) -> &str {
        self.program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("recognizer")
    }

    fn start(&mut self, sink: UtteranceSink) -> Result<(), SpeechError> {
        if self.session.is_some() {
            return Ok(());
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env(LANGUAGE_ENV, &self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or(SpeechError::MissingStdout)?;
        let stderr = child.stderr.take();
        let stopped = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        // transcripts; only an explicit stop cuts delivery short
        let reader_stopped = Arc::clone(&stopped);
        let transcript_sink = sink.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if reader_stopped.load(Ordering::SeqCst) {
                    break;
                }
                if !transcript_sink.transcript(&line).await {
                    break;
                }
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(%line, "recognizer stderr");
                }
            });
        }

        // process lifetime
        let exit_stopped = Arc::clone(&stopped);
        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };

            match exited {
                Some(status) => {
                    // every transcript printed before exit goes out ahead of the error
                    if let Err(e) = reader.await {
                        debug!(?e, "recognizer reader ended abnormally");
                    }
                    if !exit_stopped.load(Ordering::SeqCst) {
                        let error = match status {
                            Ok(status) => format!("recognizer exited ({status})"),
                            Err(e) => format!("recognizer wait failed: {e}"),
                        };
                        sink.error(error).await;
                    }
                }
                None => {
                    if let Err(e) = child.kill().await {
                        debug!(?e, "recognizer already gone");
                    }
                    reader.abort();
                }
            }
        });

        self.session = Some(Session {
            stopped,
            kill_tx: Some(kill_tx),
        });
        Ok(())
    }

    /// End the session and kill the process
    ///
    /// Only an explicit stop clears the session. A recognizer that exits on
    /// its own reports an error but stays registered until this is called.
    fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stopped.store(true, Ordering::SeqCst);
            if let Some(kill_tx) = session.kill_tx.take() {
                let _ = kill_tx.send(());
            }
        }
    }
}
