//! rc-controller: terminal remote control for an RC bot
//!
//! Provides:
//! - Manual mode: arrow keys and space drive the bot
//! - Voice mode: utterances from a speech recognizer are sent as commands
//! - Periodic polling of the bot's remote state
//! - A control panel socket standing in for on-screen buttons
//!
//! Only one input source is attached at a time. The mode coordinator owns
//! that decision and the single status line every component writes to.

mod config;
mod control;
mod events;
mod ipc;
mod keyboard;
mod lifecycle;
mod preferences;
mod speech;
mod state;
#[cfg(test)]
mod test_support;
mod ui;

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};
use crate::control::{
    CommandDispatcher, ControlApi, Haptics, HttpControlApi, NoHaptics, StatePoller, TerminalBell,
};
use crate::events::ControllerEvent;
use crate::ipc::{PanelHandles, Server};
use crate::keyboard::KeyboardListener;
use crate::lifecycle::ShutdownSignal;
use crate::preferences::{FilePreferenceStore, PreferenceStore};
use crate::speech::{SpeechCapability, SpeechInput};
use crate::state::{ModeCoordinator, StatusCell};
use crate::ui::RawModeGuard;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("rc-controller: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let interactive = std::io::stdin().is_terminal();
    if let Err(e) = init_logging(&config, interactive) {
        eprintln!("rc-controller: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(config, interactive).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Log to a file while the status line owns the terminal, else stderr
fn init_logging(config: &Config, interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match config.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });

    if interactive {
        config.ensure_dirs()?;
        let log_path = config.log_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

async fn run(config: Config, interactive: bool) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = %config.api_url,
        "rc-controller starting"
    );
    config.ensure_dirs()?;

    let preferences: Arc<dyn PreferenceStore> =
        Arc::new(FilePreferenceStore::open(&config.preferences_path()));
    let status = StatusCell::new();

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Keyboard and panel -> coordinator
    let (input_tx, input_rx) = mpsc::channel(32);
    // Recognizer -> coordinator
    let (speech_tx, speech_rx) = mpsc::channel(32);
    // Coordinator, dispatcher and poller -> panel subscribers
    let (event_tx, _event_rx) = broadcast::channel::<ControllerEvent>(64);

    let api: Arc<dyn ControlApi> = Arc::new(
        HttpControlApi::new(config.api_url.as_str(), config.request_timeout)
            .context("building HTTP client")?,
    );
    let haptics: Arc<dyn Haptics> = if config.haptics {
        Arc::new(TerminalBell)
    } else {
        Arc::new(NoHaptics)
    };
    let dispatcher =
        CommandDispatcher::new(Arc::clone(&api), status.clone(), haptics, event_tx.clone());

    let capability =
        SpeechCapability::detect(config.speech_command.as_deref(), &config.speech_language);
    let speech = SpeechInput::new(capability, speech_tx);

    let keyboard = KeyboardListener::new(input_tx.clone());
    let raw_mode = if interactive {
        match RawModeGuard::enable() {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(?e, "failed to enter raw mode");
                None
            }
        }
    } else {
        None
    };
    let raw_mode = match keyboard.start() {
        Ok(()) => {
            info!("keyboard listener started");
            raw_mode
        }
        Err(e) => {
            warn!(error = %e, "continuing without keyboard input");
            None
        }
    };

    let mut coordinator = ModeCoordinator::new(
        keyboard,
        speech,
        dispatcher,
        preferences,
        status.clone(),
        event_tx.clone(),
    );
    coordinator.mount();

    let poller = StatePoller::spawn(api, status.clone(), event_tx.clone(), config.poll_interval);

    let server = if config.panel {
        let handles = PanelHandles {
            input_tx: input_tx.clone(),
            status: status.clone(),
            snapshot_rx: coordinator.subscribe(),
            event_tx: event_tx.clone(),
            speech_available: coordinator.speech_available(),
        };
        match Server::new(&config.socket_path(), handles) {
            Ok(server) => Some(server),
            Err(e) => {
                warn!(error = %e, "control panel disabled");
                None
            }
        }
    } else {
        None
    };
    drop(input_tx);

    let status_line = raw_mode
        .as_ref()
        .map(|_| ui::spawn_status_line(status.subscribe(), coordinator.subscribe()));

    let mut event_log_rx = event_tx.subscribe();

    info!(mode = %coordinator.mode(), "controller initialized, entering main loop");

    tokio::select! {
        _ = coordinator.run(input_rx, speech_rx) => {
            info!("coordinator exited");
        }

        result = async {
            match &server {
                Some(server) => server.run().await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!(?e, "control panel server error");
            }
        }

        _ = async {
            loop {
                match event_log_rx.recv().await {
                    Ok(event) => debug!(%event, "controller event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event log receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event log exited");
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    poller.cancel().await;
    status.close();
    coordinator.shutdown();
    if let Some(server) = &server {
        server.shutdown().await;
    }
    if let Some(handle) = status_line {
        handle.abort();
    }
    drop(raw_mode);

    info!("rc-controller stopped");

    Ok(())
}
