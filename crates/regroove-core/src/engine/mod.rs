//! Playback engine - command queue, mixer mirror, loop state machine
//!
//! This module contains the real-time core of the player:
//! - Command: mutations queued by the UI and applied in the audio callback
//! - MixerState: per-channel mute/solo/volume mirror
//! - PlaybackEngine: drives the renderer and runs the pattern-loop state machine
//! - EngineAtomics: lock-free state mirror for the UI

mod atomics;
mod command;
mod mixer;
mod playback;
mod renderer;

#[cfg(test)]
pub(crate) mod testing;

pub use atomics::*;
pub use command::*;
pub use mixer::*;
pub use playback::*;
pub use renderer::*;
