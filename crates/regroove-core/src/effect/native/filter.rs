//! Resonant low-pass - Chamberlin state-variable filter

use std::f32::consts::PI;

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoSample;

/// Per-channel integrator state
#[derive(Debug, Clone, Copy, Default)]
struct SvfState {
    lp: f32,
    bp: f32,
}

impl SvfState {
    /// One Chamberlin step; returns the low-pass output
    #[inline]
    fn process(&mut self, x: f32, f: f32, q: f32) -> f32 {
        self.lp += f * self.bp;
        let hp = x - self.lp - q * self.bp;
        self.bp += f * hp;
        self.lp
    }
}

/// Resonant low-pass filter
///
/// Parameters:
/// - Cutoff: 0..1, linear up to 0.48 of Nyquist
/// - Resonance: 0..1, damping `q = max(0.7 - 0.6 * resonance, 0.1)`
///
/// Parameter jumps are not smoothed.
pub struct ResonantFilterEffect {
    base: EffectBase,
    sample_rate: f32,
    left: SvfState,
    right: SvfState,
}

impl ResonantFilterEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = EffectInfo::new("Resonant Filter")
            .with_param(ParamInfo::new("Cutoff", 1.0))
            .with_param(ParamInfo::new("Resonance", 0.0));
        Self {
            base: EffectBase::new(info),
            sample_rate: sample_rate.max(1) as f32,
            left: SvfState::default(),
            right: SvfState::default(),
        }
    }

    /// Frequency coefficient for a normalized cutoff
    fn frequency_coeff(&self, cutoff: f32) -> f32 {
        let nyquist = self.sample_rate * 0.5;
        let freq = cutoff * 0.48 * nyquist;
        2.0 * (PI * freq / self.sample_rate).sin()
    }

    fn damping(resonance: f32) -> f32 {
        (0.7 - 0.6 * resonance).max(0.1)
    }
}

impl Effect for ResonantFilterEffect {
    fn process(&mut self, buffer: &mut [StereoSample]) {
        if self.base.is_bypassed() {
            return;
        }
        let f = self.frequency_coeff(self.base.param_actual(0));
        let q = Self::damping(self.base.param_actual(1));

        for sample in buffer.iter_mut() {
            sample.left = self.left.process(sample.left, f, q);
            sample.right = self.right.process(sample.right, f, q);
        }
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.base.set_param(index, value);
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.left = SvfState::default();
        self.right = SvfState::default();
    }
}
