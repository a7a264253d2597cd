//! IPC module for control panel communication
//!
//! External panels play the role of on-screen buttons: they press drive
//! buttons, pick modes and speeds, and watch the status line.

mod protocol;
mod server;

pub use server::{PanelHandles, Server};
