//! Periodic remote state polling
//!
//! Each tick starts an independent fetch whose completion overwrites the
//! shared status. Polling ignores mode and in-flight commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::events::ControllerEvent;
use crate::state::{Status, StatusCell};

use super::api::ControlApi;

/// A running poll loop
pub struct StatePoller {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatePoller {
    /// Start polling; the first fetch happens one `interval` from now
    pub fn spawn(
        api: Arc<dyn ControlApi>,
        status: StatusCell,
        event_tx: broadcast::Sender<ControllerEvent>,
        interval: Duration,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(?interval, "state poller started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let api = Arc::clone(&api);
                        let status = status.clone();
                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            poll_once(api.as_ref(), &status, &event_tx).await;
                        });
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
            info!("state poller stopped");
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stop scheduling polls and wait for the loop to exit
    ///
    /// A fetch already in flight still completes.
    pub async fn cancel(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(?e, "state poller task ended abnormally");
            }
        }
    }
}

impl Drop for StatePoller {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

/// Run a single poll cycle and write its result to `status`
pub async fn poll_once(
    api: &dyn ControlApi,
    status: &StatusCell,
    event_tx: &broadcast::Sender<ControllerEvent>,
) -> Option<String> {
    match api.fetch_state().await {
        Ok(state) => {
            debug!(status = %state.status, "remote state polled");
            status.set(Status::Current(state.status.clone()));
            let _ = event_tx.send(ControllerEvent::StatePolled {
                status: Some(state.status.clone()),
            });
            Some(state.status)
        }
        Err(e) => {
            warn!(error = %e, "failed to fetch remote state");
            status.set(Status::StateFetchFailed);
            let _ = event_tx.send(ControllerEvent::StatePolled { status: None });
            None
        }
    }
}
