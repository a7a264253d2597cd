//! Keyboard module for terminal key input
//!
//! Uses crossterm to read arrow keys, space, and the mode/speed/quit
//! chrome keys from the controlling terminal.

mod keys;
mod listener;

pub use keys::DriveKey;
pub use listener::{KeyboardListener, KeyboardSubscription};
