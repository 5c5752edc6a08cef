//! Common types for Regroove
//!
//! Fundamental constants and the floating-point stereo sample used by the
//! effects chain. The renderer and the audio device exchange interleaved
//! signed 16-bit stereo; effects run on `StereoSample` in between.

/// Default system sample rate (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Default audio buffer granularity in frames (~5.3ms at 48kHz)
pub const DEFAULT_BUFFER_FRAMES: usize = 256;

/// Maximum buffer size to pre-allocate for real-time safety
///
/// Larger device buffers are processed in chunks of this size.
pub const MAX_BUFFER_FRAMES: usize = 8192;

/// Maximum number of tracker channels mirrored by the mixer
pub const MAX_CHANNELS: usize = 64;

/// Number of pads in each trigger pad pool (A1..A16 and S1..S16)
pub const PADS_PER_POOL: usize = 16;

/// Rows per order used by the performance display convention
pub const DISPLAY_ROWS_PER_ORDER: u32 = 64;

/// Audio sample type for effect processing
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` keeps the layout `[left, right]` so slices can be viewed as
/// interleaved data with bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Convert an interleaved 16-bit frame to floating point (-1.0..1.0)
    #[inline]
    pub fn from_i16(frame: [i16; 2]) -> Self {
        const SCALE: f32 = 1.0 / 32768.0;
        Self {
            left: frame[0] as f32 * SCALE,
            right: frame[1] as f32 * SCALE,
        }
    }

    /// Convert back to a clamped 16-bit frame
    #[inline]
    pub fn to_i16(self) -> [i16; 2] {
        [to_i16(self.left), to_i16(self.right)]
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

#[inline]
fn to_i16(value: Sample) -> i16 {
    (value * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Playback position reported by the renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Index into the order list
    pub order: usize,
    /// Pattern named by that order
    pub pattern: usize,
    /// Row within the pattern
    pub row: usize,
}

impl Position {
    pub fn new(order: usize, pattern: usize, row: usize) -> Self {
        Self { order, pattern, row }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_conversion() {
        let s = StereoSample::from_i16([16384, -16384]);
        assert!((s.left - 0.5).abs() < 1e-6);
        assert!((s.right + 0.5).abs() < 1e-6);
        assert_eq!(s.to_i16(), [16384, -16384]);
    }

    #[test]
    fn test_i16_clamps() {
        let s = StereoSample::new(2.0, -2.0);
        assert_eq!(s.to_i16(), [i16::MAX, i16::MIN]);
    }

    #[test]
    fn test_peak() {
        assert_eq!(StereoSample::new(0.25, -0.75).peak(), 0.75);
    }
}
