//! Output effects chain run by the audio thread
//!
//! The chain converts the renderer's 16-bit interleaved output to floating
//! point, runs every enabled unit in order and converts back with clamping.
//! When no unit is enabled the buffer is left untouched.

use std::sync::Arc;

use super::{Effect, EffectKind, EffectParams, MAX_EFFECT_PARAMS};
use crate::types::{StereoSample, MAX_BUFFER_FRAMES};

pub struct EffectsChain {
    params: Arc<EffectParams>,
    units: Vec<Box<dyn Effect>>,
    /// Parameter bits last pushed to each unit
    applied: [[u32; MAX_EFFECT_PARAMS]; EffectKind::COUNT],
    scratch: Vec<StereoSample>,
}

impl EffectsChain {
    pub fn new(sample_rate: u32, params: Arc<EffectParams>) -> Self {
        let units = EffectKind::ALL.iter().map(|k| k.create(sample_rate)).collect();
        let mut chain = Self {
            params,
            units,
            applied: [[u32::MAX; MAX_EFFECT_PARAMS]; EffectKind::COUNT],
            scratch: vec![StereoSample::silence(); MAX_BUFFER_FRAMES],
        };
        chain.sync_params();
        chain
    }

    pub fn params(&self) -> &Arc<EffectParams> {
        &self.params
    }

    /// Clear the internal state of every unit
    pub fn reset(&mut self) {
        for unit in &mut self.units {
            unit.reset();
        }
    }

    /// Pull enable flags and changed parameters from the shared block
    fn sync_params(&mut self) {
        for kind in EffectKind::ALL {
            let unit = &mut self.units[kind.index()];
            unit.set_bypass(!self.params.is_enabled(kind));
            for i in 0..kind.param_names().len() {
                let value = self.params.get(kind, i);
                let bits = value.to_bits();
                if self.applied[kind.index()][i] != bits {
                    self.applied[kind.index()][i] = bits;
                    unit.set_param(i, value);
                }
            }
        }
    }

    /// Process interleaved 16-bit stereo in place
    pub fn process(&mut self, out: &mut [i16]) {
        if self.params.take_reset() {
            self.reset();
        }
        self.sync_params();
        if self.units.iter().all(|u| u.is_bypassed()) {
            return;
        }

        let Ok(frames) = bytemuck::try_cast_slice_mut::<i16, [i16; 2]>(out) else {
            return;
        };
        for chunk in frames.chunks_mut(MAX_BUFFER_FRAMES) {
            let scratch = &mut self.scratch[..chunk.len()];
            for (dst, src) in scratch.iter_mut().zip(chunk.iter()) {
                *dst = StereoSample::from_i16(*src);
            }
            for unit in self.units.iter_mut().filter(|u| !u.is_bypassed()) {
                unit.process(scratch);
            }
            for (dst, src) in chunk.iter_mut().zip(scratch.iter()) {
                *dst = src.to_i16();
            }
        }
    }
}
