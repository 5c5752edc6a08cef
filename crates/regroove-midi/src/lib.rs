//! MIDI support for regroove
//!
//! This crate provides:
//! - MIDI port discovery via midir
//! - Controller input: raw bytes parsed with midly, tagged with the input
//!   slot they arrived on and bridged to the session through a flume channel
//! - Tracker note output with per-channel note tracking
//!
//! # Architecture
//!
//! ```text
//! MIDI device → midir callback → flume channel → Session::handle_midi
//! Session::poll → PlaybackEvent::Note → MidiOutputHandler → MIDI device
//! ```
//!
//! The midir callback runs on a driver thread; it only parses and forwards,
//! so a slow UI drops messages instead of stalling the driver.

mod connection;
mod input;
mod output;

pub use connection::{list_input_ports, list_output_ports, MidiConnectionError, MidiPort};
pub use input::{parse_message, MidiInputHandler, MidiInputs, MIDI_QUEUE_CAPACITY};
pub use output::{
    is_note_off_effect, MidiOutputHandler, MidiSink, NoteTracker, TrackedNote, MAX_TRACKED_CHANNELS,
};

/// Errors from MIDI output
#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error(transparent)]
    Connection(#[from] MidiConnectionError),

    #[error("Failed to send MIDI message: {0}")]
    Send(String),
}
