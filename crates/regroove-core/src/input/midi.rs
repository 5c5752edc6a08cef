//! MIDI input mapping
//!
//! Only channel voice note on/off and control change messages are consumed.
//! Every incoming message carries the index of the input port it arrived on
//! so bindings can be restricted to a device.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionEvent};

/// Default CC threshold for button-style mappings
pub const DEFAULT_CC_THRESHOLD: u8 = 64;

/// Which input ports a binding listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceFilter {
    /// Any port (`-1` in config files)
    #[default]
    Any,
    /// Never matches (`-2` in config files)
    Disabled,
    /// A specific 0-based input port
    Port(u8),
}

impl DeviceFilter {
    pub fn from_i32(value: i32) -> Self {
        match value {
            -2 => DeviceFilter::Disabled,
            v if v >= 0 => u8::try_from(v).map_or(DeviceFilter::Disabled, DeviceFilter::Port),
            _ => DeviceFilter::Any,
        }
    }

    pub fn to_i32(self) -> i32 {
        match self {
            DeviceFilter::Any => -1,
            DeviceFilter::Disabled => -2,
            DeviceFilter::Port(p) => p as i32,
        }
    }

    #[inline]
    pub fn matches(self, device: u8) -> bool {
        match self {
            DeviceFilter::Any => true,
            DeviceFilter::Disabled => false,
            DeviceFilter::Port(p) => p == device,
        }
    }
}

/// Raw 3-byte MIDI message tagged with the input it arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    /// 0-based input slot (`midi_device_0`, `midi_device_1`)
    pub device: u8,
}

/// Decoded channel voice message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    ControlChange { cc: u8, value: u8 },
    Other,
}

impl MidiEvent {
    pub fn new(status: u8, data1: u8, data2: u8, device: u8) -> Self {
        Self {
            status,
            data1,
            data2,
            device,
        }
    }

    /// Decode the message; note-on with velocity 0 is a note-off
    pub fn message(&self) -> MidiMessage {
        match self.status & 0xF0 {
            0x90 if self.data2 > 0 => MidiMessage::NoteOn {
                note: self.data1,
                velocity: self.data2,
            },
            0x90 | 0x80 => MidiMessage::NoteOff { note: self.data1 },
            0xB0 => MidiMessage::ControlChange {
                cc: self.data1,
                value: self.data2,
            },
            _ => MidiMessage::Other,
        }
    }

    /// MIDI channel (0-15)
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }
}

/// A CC bound to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiMapping {
    pub cc: u8,
    pub action: Action,
    pub parameter: i32,
    /// Fire on every value instead of once per threshold crossing
    pub continuous: bool,
    pub device: DeviceFilter,
    pub threshold: u8,
}

impl MidiMapping {
    pub fn new(cc: u8, action: Action, parameter: i32) -> Self {
        Self {
            cc,
            action,
            parameter,
            continuous: action.is_continuous(),
            device: DeviceFilter::Any,
            threshold: DEFAULT_CC_THRESHOLD,
        }
    }

    pub fn with_device(mut self, device: DeviceFilter) -> Self {
        self.device = device;
        self
    }

    pub fn with_continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(127);
        self
    }

    fn accepts(&self, cc: u8, device: u8) -> bool {
        self.cc == cc && self.device.matches(device)
    }
}

/// CC mapping table with button-edge tracking
///
/// Button-style mappings fire once when the value rises from below the
/// threshold to at or above it; the CC must drop below the threshold
/// before it can fire again.
#[derive(Debug, Clone, Default)]
pub struct MidiMap {
    mappings: Vec<MidiMapping>,
    /// (device, cc) pairs currently at or above their threshold
    held: HashMap<(u8, u8), bool>,
}

/// Maps compare by their bindings; edge-tracking state is ignored
impl PartialEq for MidiMap {
    fn eq(&self, other: &Self) -> bool {
        self.mappings == other.mappings
    }
}

impl MidiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in CC mappings used when the config has no `[midi]` section
    pub fn with_defaults() -> Self {
        let mut map = Self::new();
        map.add(MidiMapping::new(1, Action::FxFilterCutoff, 0));
        map.add(MidiMapping::new(2, Action::FxFilterResonance, 0));
        map.add(MidiMapping::new(7, Action::PitchSet, 0));
        for ch in 0..8u8 {
            map.add(MidiMapping::new(20 + ch, Action::ChannelVolume, ch as i32));
            map.add(MidiMapping::new(40 + ch, Action::ChannelMute, ch as i32));
        }
        map.add(MidiMapping::new(50, Action::PlayPause, 0));
        map.add(MidiMapping::new(51, Action::NextOrder, 0));
        map.add(MidiMapping::new(52, Action::PrevOrder, 0));
        map.add(MidiMapping::new(53, Action::PatternModeToggle, 0));
        map.add(MidiMapping::new(54, Action::RecordToggle, 0));
        map
    }

    pub fn add(&mut self, mapping: MidiMapping) {
        self.mappings.push(mapping);
    }

    pub fn mappings(&self) -> &[MidiMapping] {
        &self.mappings
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
        self.held.clear();
    }

    /// Bind a CC, or remove the binding if exactly it already exists
    ///
    /// Any other mapping of the same CC and device filter is replaced so the
    /// new binding is not shadowed. Returns `true` when the binding is
    /// present afterwards.
    pub fn toggle(&mut self, mapping: MidiMapping) -> bool {
        let existing = self.mappings.iter().position(|m| {
            m.cc == mapping.cc
                && m.device == mapping.device
                && m.action == mapping.action
                && m.parameter == mapping.parameter
        });
        if let Some(index) = existing {
            self.mappings.remove(index);
            return false;
        }
        self.mappings
            .retain(|m| !(m.cc == mapping.cc && m.device == mapping.device));
        self.mappings.push(mapping);
        true
    }

    /// Translate a CC into an action event
    ///
    /// The first mapping whose CC and device filter match decides.
    pub fn map_cc(&mut self, cc: u8, value: u8, device: u8) -> Option<ActionEvent> {
        let mapping = *self.mappings.iter().find(|m| m.accepts(cc, device))?;
        let event = ActionEvent::new(mapping.action, mapping.parameter, value);
        if mapping.continuous {
            return Some(event);
        }

        let above = value >= mapping.threshold;
        let was_above = self.held.insert((device, cc), above).unwrap_or(false);
        (above && !was_above).then_some(event)
    }
}
