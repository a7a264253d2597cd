//! State module for mode and status management
//!
//! Provides an explicit state machine with two modes:
//! - Manual: arrow keys and the speed selector drive the bot
//! - Voice: recognized utterances are forwarded as free-text commands
//!
//! and the single status value every component reports through.

mod machine;
mod mode;
mod status;

pub use machine::{InputEvent, ModeCoordinator, ModeSnapshot};
pub use mode::Mode;
pub use status::{Status, StatusCell};
