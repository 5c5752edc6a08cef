//! Lock-free engine state for UI access
//!
//! The audio thread publishes its state here at the end of every buffer.
//! The UI reads it without touching the engine or taking a lock.
//!
//! All operations use `Ordering::Relaxed` since we only need visibility,
//! not synchronization with other memory operations.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use super::MixerState;
use crate::types::{Position, MAX_CHANNELS};

/// Sentinel for "no order" in the signed order atomics
const NO_ORDER: i64 = -1;

pub struct EngineAtomics {
    /// Whether a module is installed
    pub loaded: AtomicBool,
    pub playing: AtomicBool,
    pub order: AtomicUsize,
    pub pattern: AtomicUsize,
    pub row: AtomicUsize,
    pub num_orders: AtomicUsize,
    pub num_channels: AtomicUsize,
    pub pattern_mode: AtomicBool,
    pub loop_order: AtomicUsize,
    /// Rows of the loop pattern
    pub full_loop_rows: AtomicUsize,
    /// 0 = full pattern
    pub custom_loop_rows: AtomicUsize,
    /// Order adopted at the next loop boundary, -1 if none
    pub pending_order: AtomicI64,
    /// Order queued in song mode, -1 if none
    pub queued_order: AtomicI64,
    pub looping_till: AtomicBool,
    /// Pitch factor stored as f64 bits
    pub pitch: AtomicU64,
    pub channel_muted: [AtomicBool; MAX_CHANNELS],
    pub channel_soloed: [AtomicBool; MAX_CHANNELS],
    /// Channel volume stored as f32 bits
    pub channel_volume: [AtomicU32; MAX_CHANNELS],
}

impl EngineAtomics {
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            order: AtomicUsize::new(0),
            pattern: AtomicUsize::new(0),
            row: AtomicUsize::new(0),
            num_orders: AtomicUsize::new(0),
            num_channels: AtomicUsize::new(0),
            pattern_mode: AtomicBool::new(false),
            loop_order: AtomicUsize::new(0),
            full_loop_rows: AtomicUsize::new(0),
            custom_loop_rows: AtomicUsize::new(0),
            pending_order: AtomicI64::new(NO_ORDER),
            queued_order: AtomicI64::new(NO_ORDER),
            looping_till: AtomicBool::new(false),
            pitch: AtomicU64::new(1.0f64.to_bits()),
            channel_muted: std::array::from_fn(|_| AtomicBool::new(false)),
            channel_soloed: std::array::from_fn(|_| AtomicBool::new(false)),
            channel_volume: std::array::from_fn(|_| AtomicU32::new(1.0f32.to_bits())),
        }
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Current playback position (lock-free)
    #[inline]
    pub fn position(&self) -> Position {
        Position {
            order: self.order.load(Ordering::Relaxed),
            pattern: self.pattern.load(Ordering::Relaxed),
            row: self.row.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn num_orders(&self) -> usize {
        self.num_orders.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_pattern_mode(&self) -> bool {
        self.pattern_mode.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn loop_order(&self) -> usize {
        self.loop_order.load(Ordering::Relaxed)
    }

    /// Rows currently looped in pattern mode
    #[inline]
    pub fn loop_rows(&self) -> usize {
        match self.custom_loop_rows.load(Ordering::Relaxed) {
            0 => self.full_loop_rows.load(Ordering::Relaxed),
            rows => rows,
        }
    }

    #[inline]
    pub fn pending_order(&self) -> Option<usize> {
        usize::try_from(self.pending_order.load(Ordering::Relaxed)).ok()
    }

    #[inline]
    pub fn queued_order(&self) -> Option<usize> {
        usize::try_from(self.queued_order.load(Ordering::Relaxed)).ok()
    }

    #[inline]
    pub fn is_looping_till(&self) -> bool {
        self.looping_till.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn pitch(&self) -> f64 {
        f64::from_bits(self.pitch.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_channel_muted(&self, channel: usize) -> bool {
        self.channel_muted
            .get(channel)
            .is_some_and(|m| m.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_channel_soloed(&self, channel: usize) -> bool {
        self.channel_soloed
            .get(channel)
            .is_some_and(|s| s.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn channel_volume(&self, channel: usize) -> f32 {
        self.channel_volume
            .get(channel)
            .map_or(0.0, |v| f32::from_bits(v.load(Ordering::Relaxed)))
    }

    /// Publish the channel mirror (audio thread)
    pub(crate) fn store_mixer(&self, mixer: &MixerState) {
        self.num_channels.store(mixer.len(), Ordering::Relaxed);
        for (i, ch) in mixer.channels().iter().enumerate() {
            self.channel_muted[i].store(ch.muted, Ordering::Relaxed);
            self.channel_soloed[i].store(ch.soloed, Ordering::Relaxed);
            self.channel_volume[i].store(ch.volume.to_bits(), Ordering::Relaxed);
        }
    }

    pub(crate) fn store_position(&self, position: Position) {
        self.order.store(position.order, Ordering::Relaxed);
        self.pattern.store(position.pattern, Ordering::Relaxed);
        self.row.store(position.row, Ordering::Relaxed);
    }

    pub(crate) fn store_optional_order(target: &AtomicI64, order: Option<usize>) {
        target.store(order.map_or(NO_ORDER, |o| o as i64), Ordering::Relaxed);
    }
}

impl Default for EngineAtomics {
    fn default() -> Self {
        Self::new()
    }
}
