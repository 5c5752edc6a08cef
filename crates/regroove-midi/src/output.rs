//! Tracker note output
//!
//! Mirrors the renderer's note events to a MIDI port. Each tracker channel
//! plays at most one MIDI note: a new note on the channel releases the
//! previous one first, and the note-cut effects release it without a
//! replacement.
//!
//! Note mapping:
//! - tracker note `n` plays MIDI note `n + 12`
//! - tracker volume 0..64 becomes velocity `volume * 2`, clamped to 127
//! - instrument index modulo 16 selects the MIDI channel

use midir::MidiOutputConnection;
use midly::live::LiveEvent;
use midly::num::{u4, u7};
use midly::MidiMessage;
use regroove_core::engine::{NoteEvent, PlaybackEvent};

use crate::connection::{connect_output, MidiConnectionError};
use crate::MidiError;

/// Tracker channels with note tracking
pub const MAX_TRACKED_CHANNELS: usize = 64;

const NOTE_OFFSET: u8 = 12;

/// Destination for encoded MIDI messages
pub trait MidiSink {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError>;
}

impl MidiSink for MidiOutputConnection {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        MidiOutputConnection::send(self, message).map_err(|e| MidiError::Send(e.to_string()))
    }
}

impl MidiSink for Vec<Vec<u8>> {
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError> {
        self.push(message.to_vec());
        Ok(())
    }
}

/// Effect commands that cut the channel's note
pub fn is_note_off_effect(effect: u8, param: u8) -> bool {
    matches!((effect, param), (0x0F, 0xFF) | (0x0E, 0xC0))
}

/// A MIDI note sounding for a tracker channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedNote {
    pub midi_channel: u8,
    pub midi_note: u8,
}

/// Per-tracker-channel sounding notes
#[derive(Debug, Clone)]
pub struct NoteTracker {
    notes: [Option<TrackedNote>; MAX_TRACKED_CHANNELS],
}

impl Default for NoteTracker {
    fn default() -> Self {
        Self {
            notes: [None; MAX_TRACKED_CHANNELS],
        }
    }
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: usize) -> Option<TrackedNote> {
        self.notes.get(channel).copied().flatten()
    }

    pub fn active_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_some()).count()
    }

    /// Record a new sounding note; returns the one it replaces
    pub fn start(&mut self, channel: usize, note: TrackedNote) -> Option<TrackedNote> {
        self.notes.get_mut(channel)?.replace(note)
    }

    /// Forget the channel's note; returns it if one was sounding
    pub fn release(&mut self, channel: usize) -> Option<TrackedNote> {
        self.notes.get_mut(channel)?.take()
    }

    /// Forget every note, returning those that were sounding
    pub fn release_all(&mut self) -> Vec<TrackedNote> {
        self.notes.iter_mut().filter_map(Option::take).collect()
    }
}

fn encode(channel: u8, message: MidiMessage) -> Vec<u8> {
    let event = LiveEvent::Midi {
        channel: u4::from_int_lossy(channel),
        message,
    };
    let mut bytes = Vec::with_capacity(3);
    // Writing into a Vec cannot fail
    let _ = event.write_std(&mut bytes);
    bytes
}

fn note_on(channel: u8, note: u8, velocity: u8) -> Vec<u8> {
    encode(
        channel,
        MidiMessage::NoteOn {
            key: u7::from_int_lossy(note),
            vel: u7::from_int_lossy(velocity),
        },
    )
}

fn note_off(channel: u8, note: u8) -> Vec<u8> {
    encode(
        channel,
        MidiMessage::NoteOff {
            key: u7::from_int_lossy(note),
            vel: u7::from_int_lossy(0),
        },
    )
}

/// Sends tracker notes to a MIDI sink
pub struct MidiOutputHandler<S: MidiSink = MidiOutputConnection> {
    sink: S,
    tracker: NoteTracker,
    port_name: String,
}

impl MidiOutputHandler<MidiOutputConnection> {
    /// Connect to the output port at `port_index`
    pub fn connect(port_index: usize) -> Result<Self, MidiConnectionError> {
        let (connection, port_name) = connect_output(port_index)?;
        Ok(Self::with_sink(connection, port_name))
    }
}

impl<S: MidiSink> MidiOutputHandler<S> {
    pub fn with_sink(sink: S, port_name: impl Into<String>) -> Self {
        Self {
            sink,
            tracker: NoteTracker::new(),
            port_name: port_name.into(),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn tracker(&self) -> &NoteTracker {
        &self.tracker
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Forward the note events among drained playback events
    pub fn handle_events(&mut self, events: &[PlaybackEvent]) {
        for event in events {
            if let PlaybackEvent::Note(note) = event {
                self.handle_note(note);
            }
        }
    }

    /// Apply one renderer note event
    pub fn handle_note(&mut self, event: &NoteEvent) {
        let channel = event.channel;
        if channel >= MAX_TRACKED_CHANNELS {
            return;
        }

        if is_note_off_effect(event.effect, event.effect_param) {
            self.release(channel);
            return;
        }

        let Some(note) = event.note else {
            return;
        };
        self.release(channel);

        let Some(midi_note) = note.checked_add(NOTE_OFFSET).filter(|n| *n <= 127) else {
            log::debug!("MIDI out: note {} out of range", note);
            return;
        };
        let velocity = event.volume.saturating_mul(2).min(127);
        if velocity == 0 {
            return;
        }
        let midi_channel = event.instrument % 16;

        self.send(&note_on(midi_channel, midi_note, velocity));
        self.tracker.start(
            channel,
            TrackedNote {
                midi_channel,
                midi_note,
            },
        );
    }

    /// Release every sounding note (call on stop and shutdown)
    pub fn all_notes_off(&mut self) {
        for note in self.tracker.release_all() {
            self.send(&note_off(note.midi_channel, note.midi_note));
        }
    }

    fn release(&mut self, channel: usize) {
        if let Some(note) = self.tracker.release(channel) {
            self.send(&note_off(note.midi_channel, note.midi_note));
        }
    }

    fn send(&mut self, message: &[u8]) {
        if let Err(e) = self.sink.send(message) {
            log::warn!("MIDI output: {}", e);
        }
    }
}
