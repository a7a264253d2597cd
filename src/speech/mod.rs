//! Speech module for voice-mode input
//!
//! Detects the recognition capability once and adapts it into a stream of
//! normalized utterances.

mod adapter;
mod capability;

pub use adapter::{SpeechEvent, SpeechInput};
pub use capability::SpeechCapability;
#[cfg(test)]
pub use adapter::UtteranceSink;
#[cfg(test)]
pub use capability::{Recognizer, SpeechError};
