//! Input mapping - keyboard keys and MIDI messages to actions

mod keyboard;
mod learn;
mod midi;

pub use keyboard::*;
pub use learn::*;
pub use midi::*;
