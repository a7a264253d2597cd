//! Control module for talking to the remote RC API
//!
//! Commands go out through the dispatcher; remote state comes back
//! through the poller. Both report only via the shared status.

mod api;
mod command;
mod dispatcher;
mod haptics;
pub(crate) mod poller;

pub use api::{ControlApi, HttpControlApi};
#[cfg(test)]
pub use api::{ApiError, ControlReply, RemoteState};
pub use command::{Command, DriveCommand, SpeedLevel};
pub use dispatcher::{CommandDispatcher, DispatchHandle};
pub use haptics::{Haptics, NoHaptics, TerminalBell};
pub use poller::StatePoller;
