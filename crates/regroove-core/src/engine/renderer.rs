//! Module renderer seam
//!
//! The module decoder is an external collaborator. The engine only needs a
//! handful of operations from it: render interleaved 16-bit stereo at a given
//! rate, report and set the playback position, describe the order list and
//! set per-channel volume. Anything that decodes tracker modules can sit
//! behind [`ModuleRenderer`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Position;

/// A note triggered by the renderer on one tracker channel
///
/// Forwarded to the UI thread (and optionally to MIDI output) through the
/// playback event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Tracker channel (0-based)
    pub channel: usize,
    /// Tracker note number, `None` for rows that carry no note
    pub note: Option<u8>,
    /// Instrument index
    pub instrument: u8,
    /// Tracker volume 0..64
    pub volume: u8,
    /// Effect command
    pub effect: u8,
    /// Effect parameter
    pub effect_param: u8,
}

/// Errors when decoding a module file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode module: {0}")]
    Decode(String),

    #[error("Unsupported module format: {0}")]
    Unsupported(String),

    #[error("Module has no playable orders")]
    Empty,
}

/// Opaque tracker-module renderer driven by the audio thread
///
/// Implementations own the decoded module. All methods are called from the
/// audio callback once the renderer is installed, so they must not block.
pub trait ModuleRenderer: Send {
    /// Render interleaved stereo frames into `out` (`out.len() / 2` frames)
    ///
    /// `sample_rate` is the rate the module is rendered at. The engine passes
    /// `device_rate / pitch`, so a higher pitch consumes source material
    /// faster. Returns the number of frames written.
    fn render(&mut self, sample_rate: u32, out: &mut [i16]) -> usize;

    /// Number of entries in the order list
    fn num_orders(&self) -> usize;

    /// Number of patterns in the module
    fn num_patterns(&self) -> usize;

    /// Number of tracker channels
    fn num_channels(&self) -> usize;

    /// Pattern named by an order, `None` if the order is out of range
    fn pattern_at_order(&self, order: usize) -> Option<usize>;

    /// Number of rows in a pattern (0 if out of range)
    fn pattern_rows(&self, pattern: usize) -> usize;

    /// Current playback position
    fn position(&self) -> Position;

    /// Move playback to an order and row
    fn set_position(&mut self, order: usize, row: usize);

    /// Set a channel's output volume (0.0..1.0)
    fn set_channel_volume(&mut self, channel: usize, volume: f32);

    /// Module title
    fn title(&self) -> &str {
        ""
    }

    /// Hand every note triggered since the last call to `sink`
    fn drain_note_events(&mut self, _sink: &mut dyn FnMut(NoteEvent)) {}
}

/// Decodes module files into renderers
pub trait ModuleLoader: Send {
    fn load(&self, path: &Path) -> Result<Box<dyn ModuleRenderer>, LoadError>;
}

/// Find the first order that plays `pattern`
pub fn first_order_of_pattern(renderer: &dyn ModuleRenderer, pattern: usize) -> Option<usize> {
    (0..renderer.num_orders()).find(|&order| renderer.pattern_at_order(order) == Some(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeRenderer;

    #[test]
    fn test_first_order_of_pattern() {
        let renderer = FakeRenderer::new(vec![2, 0, 1, 0], 64);
        assert_eq!(first_order_of_pattern(&renderer, 0), Some(1));
        assert_eq!(first_order_of_pattern(&renderer, 2), Some(0));
        assert_eq!(first_order_of_pattern(&renderer, 7), None);
    }

    #[test]
    fn test_load_error_display() {
        let err = LoadError::Unsupported("wav".into());
        assert_eq!(err.to_string(), "Unsupported module format: wav");
    }
}
