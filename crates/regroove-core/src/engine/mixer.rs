//! Per-channel mute/solo/volume mirror
//!
//! The mirror is the authoritative channel state. The renderer only ever
//! sees the projection `muted ? 0.0 : volume`, reapplied after each change.
//!
//! Solo is exclusive and does not remember the mute set it replaced:
//! un-soloing unmutes every channel.

use serde::{Deserialize, Serialize};

use super::ModuleRenderer;
use crate::types::MAX_CHANNELS;

/// State of a single tracker channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    /// Volume (0.0 - 1.0)
    pub volume: f32,
    pub muted: bool,
    pub soloed: bool,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            soloed: false,
        }
    }
}

impl ChannelState {
    /// Volume as applied to the renderer
    #[inline]
    pub fn applied_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Channel mirror sized to the loaded module
///
/// Backed by a fixed array so the audio thread never allocates.
#[derive(Debug, Clone)]
pub struct MixerState {
    channels: [ChannelState; MAX_CHANNELS],
    len: usize,
}

impl Default for MixerState {
    fn default() -> Self {
        Self::new(0)
    }
}

impl MixerState {
    /// Create a mirror with `num_channels` channels at full volume
    pub fn new(num_channels: usize) -> Self {
        Self {
            channels: [ChannelState::default(); MAX_CHANNELS],
            len: num_channels.min(MAX_CHANNELS),
        }
    }

    /// Reset to `num_channels` channels at full volume, unmuted
    pub fn reset(&mut self, num_channels: usize) {
        *self = Self::new(num_channels);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels[..self.len].get(index)
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels[..self.len]
    }

    /// Flip a channel's mute flag. Returns `false` for an invalid index.
    pub fn toggle_mute(&mut self, index: usize) -> bool {
        match self.channels[..self.len].get_mut(index) {
            Some(ch) => {
                ch.muted = !ch.muted;
                true
            }
            None => false,
        }
    }

    /// Toggle exclusive solo on a channel
    ///
    /// Soloing mutes every other channel and unmutes this one. Toggling solo
    /// off unmutes all channels.
    pub fn toggle_solo(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let channels = &mut self.channels[..self.len];
        if channels[index].soloed {
            for ch in channels.iter_mut() {
                ch.soloed = false;
                ch.muted = false;
            }
        } else {
            for (i, ch) in channels.iter_mut().enumerate() {
                ch.soloed = i == index;
                ch.muted = i != index;
            }
        }
        true
    }

    /// Set a channel volume, clamped to 0.0..1.0
    pub fn set_volume(&mut self, index: usize, volume: f32) -> bool {
        match self.channels[..self.len].get_mut(index) {
            Some(ch) if volume.is_finite() => {
                ch.volume = volume.clamp(0.0, 1.0);
                true
            }
            _ => false,
        }
    }

    /// Mute every channel, leaving volumes untouched
    pub fn mute_all(&mut self) {
        for ch in &mut self.channels[..self.len] {
            ch.muted = true;
            ch.soloed = false;
        }
    }

    /// Unmute every channel, leaving volumes untouched
    pub fn unmute_all(&mut self) {
        for ch in &mut self.channels[..self.len] {
            ch.muted = false;
            ch.soloed = false;
        }
    }

    /// Push the projected volumes of every channel to the renderer
    pub fn apply(&self, renderer: &mut dyn ModuleRenderer) {
        for (i, ch) in self.channels().iter().enumerate() {
            renderer.set_channel_volume(i, ch.applied_volume());
        }
    }

    /// Push one channel's projected volume to the renderer
    pub fn apply_channel(&self, renderer: &mut dyn ModuleRenderer, index: usize) {
        if let Some(ch) = self.channel(index) {
            renderer.set_channel_volume(index, ch.applied_volume());
        }
    }
}
