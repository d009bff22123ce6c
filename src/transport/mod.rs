//! Playback transport: command parsing and the engine-time state machine.
//!
//! Commands are pure state transitions; nothing here touches GPU state, so
//! the frame loop may execute them between any two frames.

/// Textual command parsing.
pub mod command;
/// Engine-time state machine.
pub mod time;

pub use command::{CommandError, TransportCommand};
pub use time::{EngineTime, PlaybackState};
