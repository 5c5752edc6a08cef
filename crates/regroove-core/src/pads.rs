//! Trigger pads
//!
//! Two pools of 16 pads: application pads (A1..A16) live in the global
//! config, song pads (S1..S16) in the song's `.rgx` file. Actions address
//! them with one index space: 0..15 application, 16..31 song.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::input::DeviceFilter;
use crate::types::PADS_PER_POOL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TriggerPad {
    pub action: Action,
    pub parameter: i32,
    /// MIDI note that fires this pad
    pub midi_note: Option<u8>,
    pub midi_device: DeviceFilter,
}

impl TriggerPad {
    pub fn new(action: Action, parameter: i32) -> Self {
        Self {
            action,
            parameter,
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: u8, device: DeviceFilter) -> Self {
        self.midi_note = Some(note);
        self.midi_device = device;
        self
    }

    /// Whether the pad carries anything worth persisting
    pub fn is_configured(&self) -> bool {
        self.action != Action::None || self.midi_note.is_some()
    }

    #[inline]
    pub fn matches_note(&self, note: u8, device: u8) -> bool {
        self.midi_note == Some(note) && self.midi_device.matches(device)
    }

    /// Assign a note, or clear it if exactly this note is already assigned
    ///
    /// Returns `true` when the note is assigned afterwards.
    pub fn toggle_note(&mut self, note: u8, device: DeviceFilter) -> bool {
        if self.midi_note == Some(note) && self.midi_device == device {
            self.midi_note = None;
            self.midi_device = DeviceFilter::Any;
            false
        } else {
            self.midi_note = Some(note);
            self.midi_device = device;
            true
        }
    }
}

/// One pool of pads
pub type PadBank = [TriggerPad; PADS_PER_POOL];

/// A pad addressed by pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadRef {
    App(usize),
    Song(usize),
}

impl PadRef {
    /// Resolve a `trigger_pad` parameter (0..15 application, 16..31 song)
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            i if i < PADS_PER_POOL => Some(PadRef::App(i)),
            i if i < 2 * PADS_PER_POOL => Some(PadRef::Song(i - PADS_PER_POOL)),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            PadRef::App(i) => i,
            PadRef::Song(i) => i + PADS_PER_POOL,
        }
    }
}

/// Find the pad a note-on fires: application pads first, then song pads
pub fn find_pad_for_note(app: &PadBank, song: &PadBank, note: u8, device: u8) -> Option<PadRef> {
    if let Some(i) = app.iter().position(|p| p.matches_note(note, device)) {
        return Some(PadRef::App(i));
    }
    song.iter()
        .position(|p| p.matches_note(note, device))
        .map(PadRef::Song)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_ref_index_space() {
        assert_eq!(PadRef::from_index(0), Some(PadRef::App(0)));
        assert_eq!(PadRef::from_index(15), Some(PadRef::App(15)));
        assert_eq!(PadRef::from_index(16), Some(PadRef::Song(0)));
        assert_eq!(PadRef::from_index(31), Some(PadRef::Song(15)));
        assert_eq!(PadRef::from_index(32), None);
        assert_eq!(PadRef::Song(3).index(), 19);
    }

    #[test]
    fn test_find_pad_prefers_app_pool() {
        let mut app = PadBank::default();
        let mut song = PadBank::default();
        app[4] = TriggerPad::new(Action::MuteAll, 0).with_note(36, DeviceFilter::Port(1));
        song[2] = TriggerPad::new(Action::Play, 0).with_note(36, DeviceFilter::Any);

        assert_eq!(find_pad_for_note(&app, &song, 36, 1), Some(PadRef::App(4)));
        assert_eq!(find_pad_for_note(&app, &song, 36, 0), Some(PadRef::Song(2)));
        assert_eq!(find_pad_for_note(&app, &song, 37, 0), None);
    }

    #[test]
    fn test_disabled_pad_never_matches() {
        let pad = TriggerPad::new(Action::Play, 0).with_note(40, DeviceFilter::Disabled);
        assert!(!pad.matches_note(40, 0));
    }

    #[test]
    fn test_toggle_note() {
        let mut pad = TriggerPad::new(Action::Stop, 0);
        assert!(pad.toggle_note(48, DeviceFilter::Port(0)));
        assert!(pad.matches_note(48, 0));
        assert!(!pad.toggle_note(48, DeviceFilter::Port(0)));
        assert_eq!(pad.midi_note, None);
    }

    #[test]
    fn test_is_configured() {
        assert!(!TriggerPad::default().is_configured());
        assert!(TriggerPad::new(Action::Play, 0).is_configured());
        assert!(TriggerPad::default().with_note(1, DeviceFilter::Any).is_configured());
    }
}
