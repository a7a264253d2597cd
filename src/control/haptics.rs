//! Haptic feedback on dispatch
//!
//! Fire-and-forget; never affects the dispatch outcome.

use std::io::Write;
use std::time::Duration;

use tracing::trace;

/// Length of the pulse fired on each dispatch attempt
pub const DISPATCH_PULSE: Duration = Duration::from_millis(200);

/// A platform haptic actuator
pub trait Haptics: Send + Sync {
    fn pulse(&self, duration: Duration);
}

/// The platform exposes no actuator
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, _duration: Duration) {}
}

/// Rings the terminal bell in place of a vibration motor
pub struct TerminalBell;

impl Haptics for TerminalBell {
    fn pulse(&self, duration: Duration) {
        trace!(?duration, "bell pulse");
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}
