//! Performance recorder and player
//!
//! The performance is a row-stamped log of actions. While recording, every
//! user action is appended at the current performance row; while playing,
//! the events of each row are handed back for dispatch. The row advances by
//! one per playback row change, so replay is row-accurate.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionEvent};
use crate::types::DISPLAY_ROWS_PER_ORDER;

/// Maximum number of events in one performance
pub const MAX_PERFORMANCE_EVENTS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEvent {
    /// Absolute performance row
    pub row: u32,
    pub action: Action,
    pub parameter: i32,
    /// Event value (0..127), kept as float for the on-disk format
    pub value: f32,
}

impl PerformanceEvent {
    pub fn new(row: u32, event: ActionEvent) -> Self {
        Self {
            row,
            action: event.action,
            parameter: event.parameter,
            value: event.value as f32,
        }
    }

    pub fn to_action_event(&self) -> ActionEvent {
        let value = if self.value.is_finite() {
            self.value.round().clamp(0.0, 127.0) as u8
        } else {
            0
        };
        ActionEvent::new(self.action, self.parameter, value)
    }
}

/// Display position for an absolute row: `(row / 64, row % 64)`
///
/// Independent of the module's real pattern lengths.
pub fn display_position(row: u32) -> (u32, u32) {
    (row / DISPLAY_ROWS_PER_ORDER, row % DISPLAY_ROWS_PER_ORDER)
}

#[derive(Debug, Clone, Default)]
pub struct Performance {
    row: u32,
    recording: bool,
    playing: bool,
    events: Vec<PerformanceEvent>,
    playback_index: usize,
    warned_full: bool,
}

impl Performance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn events(&self) -> &[PerformanceEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Start recording into a fresh log, or freeze the log
    ///
    /// Starting recording stops playback.
    pub fn set_recording(&mut self, recording: bool) {
        if recording {
            self.events.clear();
            self.row = 0;
            self.playback_index = 0;
            self.playing = false;
            self.warned_full = false;
        }
        self.recording = recording;
    }

    /// Start playback from row 0, or stop it and rewind
    pub fn set_playback(&mut self, playing: bool) {
        if playing {
            self.recording = false;
        }
        self.playing = playing;
        self.row = 0;
        self.playback_index = 0;
    }

    /// Advance one row (called once per playback row change)
    pub fn tick(&mut self) {
        if self.recording || self.playing {
            self.row = self.row.saturating_add(1);
        }
    }

    /// Append an event at the current row while recording
    ///
    /// Returns `false` when not recording or when the log is full.
    pub fn record_event(&mut self, event: ActionEvent) -> bool {
        if !self.recording {
            return false;
        }
        if self.events.len() >= MAX_PERFORMANCE_EVENTS {
            if !self.warned_full {
                log::warn!("Performance: log full ({} events), not recording", MAX_PERFORMANCE_EVENTS);
                self.warned_full = true;
            }
            return false;
        }
        self.events.push(PerformanceEvent::new(self.row, event));
        true
    }

    /// Events stamped with the current row, in insertion order
    ///
    /// Events of rows already passed are skipped.
    pub fn events_at_current_row(&mut self) -> Vec<ActionEvent> {
        let mut due = Vec::new();
        if !self.playing {
            return due;
        }
        while self
            .events
            .get(self.playback_index)
            .is_some_and(|e| e.row < self.row)
        {
            self.playback_index += 1;
        }
        while let Some(event) = self
            .events
            .get(self.playback_index)
            .filter(|e| e.row == self.row)
        {
            due.push(event.to_action_event());
            self.playback_index += 1;
        }
        due
    }

    /// Whether playback has delivered every event
    pub fn is_finished(&self) -> bool {
        self.playing && self.playback_index >= self.events.len()
    }

    // ─────────────────────────────────────────────────────────────
    // Editing (only while not recording)
    // ─────────────────────────────────────────────────────────────

    /// Insert an event after any existing events of the same row
    pub fn insert_event(&mut self, event: PerformanceEvent) -> bool {
        if self.recording || self.events.len() >= MAX_PERFORMANCE_EVENTS {
            return false;
        }
        let at = self.events.partition_point(|e| e.row <= event.row);
        self.events.insert(at, event);
        true
    }

    pub fn remove_event(&mut self, index: usize) -> Option<PerformanceEvent> {
        if self.recording || index >= self.events.len() {
            return None;
        }
        Some(self.events.remove(index))
    }

    pub fn clear(&mut self) {
        if self.recording {
            return;
        }
        self.events.clear();
        self.playback_index = 0;
    }

    /// Replace the log (e.g. from a song file); sorted by row, capped
    pub fn set_events(&mut self, mut events: Vec<PerformanceEvent>) {
        events.sort_by_key(|e| e.row);
        events.truncate(MAX_PERFORMANCE_EVENTS);
        self.events = events;
        self.recording = false;
        self.playing = false;
        self.row = 0;
        self.playback_index = 0;
    }
}
