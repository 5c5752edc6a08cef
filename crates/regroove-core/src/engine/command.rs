//! Lock-free command queue for playback engine control
//!
//! The UI thread never touches the renderer. Every mutation of engine state
//! is expressed as a [`Command`], pushed into an `rtrb` ring and applied by
//! the audio callback at the start of the next buffer, in enqueue order.
//!
//! # Real-Time Safety
//!
//! - **No allocations**: the ring is allocated once at startup
//! - **Wait-free**: push and pop are O(1) and never block
//! - **Overflow is non-fatal**: a full ring drops the command and counts it
//!
//! # Usage
//!
//! ```ignore
//! let (producer, consumer) = command_channel();
//! let mut handle = EngineHandle::new(producer, atomics.clone());
//!
//! // UI thread
//! handle.queue_next_order();
//!
//! // Audio thread
//! engine.process_commands(&mut consumer);
//! ```

use std::sync::Arc;

use super::EngineAtomics;

/// Commands sent from the UI thread to the audio thread
///
/// Indices are validated on the audio thread against the loaded module;
/// out-of-range values are ignored there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    // ─────────────────────────────────────────────────────────────
    // Navigation
    // ─────────────────────────────────────────────────────────────
    /// Queue a jump to an order (song mode: next buffer, pattern mode: next loop boundary)
    QueueOrder(usize),
    /// Queue a jump to the first order that plays this pattern
    QueuePattern(usize),
    /// Queue the order after the current (or already queued) one, wrapping
    QueueNextOrder,
    /// Queue the order before the current (or already queued) one, wrapping
    QueuePrevOrder,
    /// Jump immediately to row 0 of an order
    JumpToOrder(usize),
    /// Jump immediately to the first order that plays this pattern
    JumpToPattern(usize),

    // ─────────────────────────────────────────────────────────────
    // Looping
    // ─────────────────────────────────────────────────────────────
    /// Replay rows 0..row of the current order once, then continue
    LoopTillRow(usize),
    /// Enter (capturing the current order) or leave pattern mode
    SetPatternMode(bool),
    /// Restart the current order from row 0
    RetriggerPattern,
    /// Loop only the first N rows of the loop pattern (0 = full pattern)
    SetCustomLoopRows(usize),
    /// Halve the active loop length (floored at one row)
    HalveLoop,
    /// Set the loop length to `(step + 1) / 16` of the pattern (step 15 = full)
    SetLoopStep(u8),

    // ─────────────────────────────────────────────────────────────
    // Channels
    // ─────────────────────────────────────────────────────────────
    ToggleChannelMute(usize),
    ToggleChannelSolo(usize),
    MuteAll,
    UnmuteAll,
    SetChannelVolume { channel: usize, volume: f32 },
    /// Restore every channel to full volume, unmuted, unsoloed
    ResetChannels,

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    /// Set the pitch factor (clamped to [0.01, 4.0])
    SetPitch(f64),
    SetPlaying(bool),
}

/// Capacity of the command ringbuffer
///
/// Sized for bursts of mute toggles from a MIDI controller between two
/// audio callbacks.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel pair
pub fn command_channel() -> (rtrb::Producer<Command>, rtrb::Consumer<Command>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// UI-side handle to the playback engine
///
/// Mutators enqueue commands and return immediately. State is read back
/// through the shared [`EngineAtomics`] mirror.
pub struct EngineHandle {
    producer: rtrb::Producer<Command>,
    atomics: Arc<EngineAtomics>,
    dropped: u64,
    overflowing: bool,
}

impl EngineHandle {
    pub fn new(producer: rtrb::Producer<Command>, atomics: Arc<EngineAtomics>) -> Self {
        Self {
            producer,
            atomics,
            dropped: 0,
            overflowing: false,
        }
    }

    /// Push a command, dropping it if the ring is full
    ///
    /// Returns `false` when the command was dropped. A warning is logged once
    /// per overflow burst; the burst ends at the next successful push.
    pub fn send(&mut self, command: Command) -> bool {
        match self.producer.push(command) {
            Ok(()) => {
                self.overflowing = false;
                true
            }
            Err(_) => {
                self.dropped += 1;
                if !self.overflowing {
                    log::warn!(
                        "Command queue full ({} slots), dropping {:?}",
                        COMMAND_QUEUE_CAPACITY,
                        command
                    );
                    self.overflowing = true;
                }
                false
            }
        }
    }

    /// Total number of commands dropped because the queue was full
    pub fn dropped_commands(&self) -> u64 {
        self.dropped
    }

    /// Lock-free view of engine state
    pub fn atomics(&self) -> &Arc<EngineAtomics> {
        &self.atomics
    }

    pub fn queue_order(&mut self, order: usize) {
        self.send(Command::QueueOrder(order));
    }

    pub fn queue_pattern(&mut self, pattern: usize) {
        self.send(Command::QueuePattern(pattern));
    }

    pub fn queue_next_order(&mut self) {
        self.send(Command::QueueNextOrder);
    }

    pub fn queue_prev_order(&mut self) {
        self.send(Command::QueuePrevOrder);
    }

    pub fn jump_to_order(&mut self, order: usize) {
        self.send(Command::JumpToOrder(order));
    }

    pub fn jump_to_pattern(&mut self, pattern: usize) {
        self.send(Command::JumpToPattern(pattern));
    }

    pub fn loop_till_row(&mut self, row: usize) {
        self.send(Command::LoopTillRow(row));
    }

    pub fn set_pattern_mode(&mut self, enabled: bool) {
        self.send(Command::SetPatternMode(enabled));
    }

    pub fn retrigger_pattern(&mut self) {
        self.send(Command::RetriggerPattern);
    }

    pub fn set_custom_loop_rows(&mut self, rows: usize) {
        self.send(Command::SetCustomLoopRows(rows));
    }

    pub fn halve_loop(&mut self) {
        self.send(Command::HalveLoop);
    }

    pub fn set_loop_step(&mut self, step: u8) {
        self.send(Command::SetLoopStep(step));
    }

    pub fn toggle_channel_mute(&mut self, channel: usize) {
        self.send(Command::ToggleChannelMute(channel));
    }

    pub fn toggle_channel_solo(&mut self, channel: usize) {
        self.send(Command::ToggleChannelSolo(channel));
    }

    pub fn mute_all(&mut self) {
        self.send(Command::MuteAll);
    }

    pub fn unmute_all(&mut self) {
        self.send(Command::UnmuteAll);
    }

    pub fn set_channel_volume(&mut self, channel: usize, volume: f32) {
        self.send(Command::SetChannelVolume { channel, volume });
    }

    pub fn reset_channels(&mut self) {
        self.send(Command::ResetChannels);
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        self.send(Command::SetPitch(pitch));
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.send(Command::SetPlaying(playing));
    }
}
