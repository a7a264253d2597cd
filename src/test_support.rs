//! Shared fakes for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::control::{ApiError, ControlApi, ControlReply, Haptics, RemoteState};
use crate::speech::{Recognizer, SpeechError, UtteranceSink};

/// In-memory control API that records every command it receives
pub struct FakeApi {
    sent: Mutex<Vec<String>>,
    fail_commands: AtomicBool,
    remote_status: Mutex<Option<String>>,
    polls: AtomicUsize,
    /// When set, each command waits for a permit before answering
    command_gate: Option<Arc<Semaphore>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_commands: AtomicBool::new(false),
            remote_status: Mutex::new(Some("idle".to_string())),
            polls: AtomicUsize::new(0),
            command_gate: None,
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            command_gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_commands(&self) {
        self.fail_commands.store(true, Ordering::SeqCst);
    }

    /// `None` makes state fetches fail
    pub fn set_remote_status(&self, status: Option<&str>) {
        *self.remote_status.lock().unwrap() = status.map(str::to_string);
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControlApi for FakeApi {
    async fn send_command(&self, cmd: &str) -> Result<ControlReply, ApiError> {
        self.sent.lock().unwrap().push(cmd.to_string());

        if let Some(gate) = &self.command_gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.fail_commands.load(Ordering::SeqCst) {
            Err(ApiError::HttpStatus(500))
        } else {
            Ok(ControlReply {
                message: Some("ok".to_string()),
            })
        }
    }

    async fn fetch_state(&self) -> Result<RemoteState, ApiError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.remote_status.lock().unwrap().clone() {
            Some(status) => Ok(RemoteState { status }),
            None => Err(ApiError::Malformed("unreachable".to_string())),
        }
    }
}

/// Haptics that only counts pulses
#[derive(Default)]
pub struct CountingHaptics {
    pulses: AtomicUsize,
}

impl CountingHaptics {
    pub fn pulses(&self) -> usize {
        self.pulses.load(Ordering::SeqCst)
    }
}

impl Haptics for CountingHaptics {
    fn pulse(&self, _duration: Duration) {
        self.pulses.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecognizerState {
    starts: AtomicUsize,
    stops: AtomicUsize,
    sink: Mutex<Option<UtteranceSink>>,
}

/// Recognizer driven by the test through a [`RecognizerRemote`]
pub struct FakeRecognizer {
    state: Arc<RecognizerState>,
    fail_start: bool,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RecognizerState::default()),
            fail_start: false,
        }
    }

    /// A recognizer whose `start` always errors
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    pub fn remote(&self) -> RecognizerRemote {
        RecognizerRemote {
            state: Arc::clone(&self.state),
        }
    }
}

impl Recognizer for FakeRecognizer {
    fn name(&self) -> &str {
        "fake"
    }

    fn start(&mut self, sink: UtteranceSink) -> Result<(), SpeechError> {
        if self.fail_start {
            return Err(SpeechError::MissingStdout);
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        *self.state.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        *self.state.sink.lock().unwrap() = None;
    }
}

/// Test-side view of a [`FakeRecognizer`]
#[derive(Clone)]
pub struct RecognizerRemote {
    state: Arc<RecognizerState>,
}

impl RecognizerRemote {
    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    fn sink(&self) -> UtteranceSink {
        self.state
            .sink
            .lock()
            .unwrap()
            .clone()
            .expect("recognizer is not started")
    }

    /// Emit a raw final transcript
    pub async fn hear(&self, transcript: &str) {
        self.sink().transcript(transcript).await;
    }

    /// Emit a recognition error
    pub async fn fail(&self, error: &str) {
        self.sink().error(error.to_string()).await;
    }
}
