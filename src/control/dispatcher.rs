//! Command dispatcher
//!
//! Turns a raw input into exactly one request to the control API and
//! reports the outcome through the shared status. Every call spawns its
//! own request task: there is no queue, no de-duplication, and no retry.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::ControllerEvent;
use crate::state::{Status, StatusCell};

use super::api::ControlApi;
use super::command::{wire_command, Command};
use super::haptics::{Haptics, DISPATCH_PULSE};

/// Terminal result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        command: String,
        message: Option<String>,
    },
    Failed {
        command: String,
        error: String,
    },
}

impl DispatchOutcome {
    #[cfg(test)]
    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent { .. })
    }
}

/// Handle to an in-flight dispatch
pub type DispatchHandle = JoinHandle<DispatchOutcome>;

/// Sends commands to the remote control API
#[derive(Clone)]
pub struct CommandDispatcher {
    api: Arc<dyn ControlApi>,
    status: StatusCell,
    haptics: Arc<dyn Haptics>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl CommandDispatcher {
    pub fn new(
        api: Arc<dyn ControlApi>,
        status: StatusCell,
        haptics: Arc<dyn Haptics>,
        event_tx: broadcast::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            api,
            status,
            haptics,
            event_tx,
        }
    }

    /// Dispatch a command value
    pub fn send(&self, command: &Command) -> DispatchHandle {
        self.dispatch(&command.raw(), command.is_voice())
    }

    /// Dispatch a raw input
    ///
    /// The in-flight status is written before this returns; the request
    /// itself completes on a spawned task. Must be called from within a
    /// tokio runtime.
    pub fn dispatch(&self, raw: &str, is_voice: bool) -> DispatchHandle {
        let wire = wire_command(raw, is_voice);

        debug!(command = %wire, is_voice, "dispatching command");
        self.status.set(Status::Sending(wire.clone()));
        self.haptics.pulse(DISPATCH_PULSE);
        let _ = self.event_tx.send(ControllerEvent::CommandDispatched {
            command: wire.clone(),
            is_voice,
        });

        let api = Arc::clone(&self.api);
        let status = self.status.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let outcome = match api.send_command(&wire).await {
                Ok(reply) => {
                    info!(
                        command = %wire,
                        message = reply.message.as_deref().unwrap_or(""),
                        "command sent"
                    );
                    status.set(Status::Sent(wire.clone()));
                    DispatchOutcome::Sent {
                        command: wire,
                        message: reply.message,
                    }
                }
                Err(e) => {
                    warn!(command = %wire, error = %e, "command failed");
                    status.set(Status::CommandFailed);
                    DispatchOutcome::Failed {
                        command: wire,
                        error: e.to_string(),
                    }
                }
            };

            let (command, success) = match &outcome {
                DispatchOutcome::Sent { command, .. } => (command.clone(), true),
                DispatchOutcome::Failed { command, .. } => (command.clone(), false),
            };
            let _ = event_tx.send(ControllerEvent::CommandCompleted { command, success });

            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::command::DriveCommand;
    use crate::test_support::{CountingHaptics, FakeApi};
    use tokio::sync::Semaphore;

    fn dispatcher_with(api: Arc<FakeApi>) -> (CommandDispatcher, StatusCell, Arc<CountingHaptics>) {
        let status = StatusCell::new();
        let haptics = Arc::new(CountingHaptics::default());
        let (event_tx, _) = broadcast::channel(16);
        let dispatcher = CommandDispatcher::new(api, status.clone(), haptics.clone(), event_tx);
        (dispatcher, status, haptics)
    }

    #[tokio::test]
    async fn test_manual_dispatch_success() {
        let api = Arc::new(FakeApi::new());
        let (dispatcher, status, _) = dispatcher_with(api.clone());

        let outcome = dispatcher.dispatch("forward", false).await.unwrap();

        assert_eq!(api.sent(), vec!["forward".to_string()]);
        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                command: "forward".to_string(),
                message: Some("ok".to_string())
            }
        );
        assert_eq!(status.get().to_string(), "✅ FORWARD sent");
    }

    #[tokio::test]
    async fn test_voice_dispatch_prefixes_wire_command() {
        let api = Arc::new(FakeApi::new());
        let (dispatcher, status, _) = dispatcher_with(api.clone());

        dispatcher.send(&Command::voice("turn left")).await.unwrap();

        assert_eq!(api.sent(), vec!["voice:turn left".to_string()]);
        assert_eq!(status.get().to_string(), "✅ VOICE:TURN LEFT sent");
    }

    #[tokio::test]
    async fn test_in_flight_status_set_before_completion() {
        let gate = Arc::new(Semaphore::new(0));
        let api = Arc::new(FakeApi::gated(gate.clone()));
        let (dispatcher, status, _) = dispatcher_with(api);

        let handle = dispatcher.send(&Command::manual(DriveCommand::Stop));
        assert_eq!(status.get(), Status::Sending("stop".to_string()));

        gate.add_permits(1);
        assert!(handle.await.unwrap().is_sent());
        assert_eq!(status.get(), Status::Sent("stop".to_string()));
    }

    #[tokio::test]
    async fn test_failure_sets_failed_status_without_retry() {
        let api = Arc::new(FakeApi::new());
        api.fail_commands();
        let (dispatcher, status, _) = dispatcher_with(api.clone());

        let outcome = dispatcher.dispatch("left", false).await.unwrap();

        assert!(!outcome.is_sent());
        assert_eq!(api.sent().len(), 1);
        assert_eq!(status.get(), Status::CommandFailed);
    }

    #[tokio::test]
    async fn test_haptic_pulse_on_every_attempt() {
        let api = Arc::new(FakeApi::new());
        api.fail_commands();
        let (dispatcher, _, haptics) = dispatcher_with(api);

        dispatcher.dispatch("right", false).await.unwrap();
        dispatcher.dispatch("right", false).await.unwrap();

        assert_eq!(haptics.pulses(), 2);
    }

    #[tokio::test]
    async fn test_rapid_triggers_are_not_deduplicated() {
        let gate = Arc::new(Semaphore::new(0));
        let api = Arc::new(FakeApi::gated(gate.clone()));
        let (dispatcher, _, _) = dispatcher_with(api.clone());

        let handles: Vec<_> = (0..3).map(|_| dispatcher.dispatch("forward", false)).collect();

        // all three requests are outstanding at once
        while api.sent().len() < 3 {
            tokio::task::yield_now().await;
        }

        gate.add_permits(3);
        for handle in handles {
            assert!(handle.await.unwrap().is_sent());
        }
        assert_eq!(api.sent(), vec!["forward"; 3]);
    }

    #[tokio::test]
    async fn test_last_completion_wins() {
        let api = Arc::new(FakeApi::new());
        let (dispatcher, status, _) = dispatcher_with(api.clone());

        dispatcher.dispatch("left", false).await.unwrap();
        api.fail_commands();
        dispatcher.dispatch("right", false).await.unwrap();

        assert_eq!(status.get(), Status::CommandFailed);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let api = Arc::new(FakeApi::new());
        let status = StatusCell::new();
        let (event_tx, mut event_rx) = broadcast::channel(16);
        let dispatcher =
            CommandDispatcher::new(api, status, Arc::new(CountingHaptics::default()), event_tx);

        dispatcher.dispatch("stop", false).await.unwrap();

        assert_eq!(
            event_rx.recv().await.unwrap(),
            ControllerEvent::CommandDispatched {
                command: "stop".to_string(),
                is_voice: false
            }
        );
        assert_eq!(
            event_rx.recv().await.unwrap(),
            ControllerEvent::CommandCompleted {
                command: "stop".to_string(),
                success: true
            }
        );
    }
}
