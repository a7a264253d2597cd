//! Terminal status line
//!
//! Renders the current mode and status on a single line and restores the
//! terminal when the guard drops.

use std::io::{self, Write};

use crossterm::{
    cursor::MoveToColumn,
    queue,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::state::{Mode, ModeSnapshot, Status};

const HELP: &str = "arrows/space: drive (manual)  1/2/3: speed  m: manual  v: voice  q: quit";

/// Raw mode for the lifetime of the guard
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(?e, "failed to restore terminal");
        }
        println!();
    }
}

/// Format the status line
pub fn render_line(snapshot: &ModeSnapshot, status: &Status) -> String {
    let mode = match snapshot.mode {
        Mode::Manual => "MANUAL",
        Mode::Voice if snapshot.listening => "VOICE ●",
        Mode::Voice => "VOICE ○",
    };
    format!("[{mode}] Status: {status}")
}

fn draw(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    queue!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    write!(stdout, "{line}")?;
    stdout.flush()
}

/// Redraw the status line whenever status or mode changes
pub fn spawn_status_line(
    mut status_rx: watch::Receiver<Status>,
    mut snapshot_rx: watch::Receiver<ModeSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        print!("{HELP}\r\n");
        loop {
            let line = render_line(&snapshot_rx.borrow_and_update(), &status_rx.borrow_and_update());
            if let Err(e) = draw(&line) {
                warn!(?e, "status line draw failed");
                break;
            }

            tokio::select! {
                changed = status_rx.changed() => if changed.is_err() { break },
                changed = snapshot_rx.changed() => if changed.is_err() { break },
            }
        }
    })
}
