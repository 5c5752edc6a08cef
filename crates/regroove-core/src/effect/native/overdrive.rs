//! Overdrive - gain into a soft clipper with dry/wet mix

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoSample;

/// Soft clipper
///
/// Linear below 1/3, quadratic knee between 1/3 and 1, hard clamp above.
/// Continuous at both joins and odd-symmetric.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    let a = x.abs();
    let y = if a < 1.0 / 3.0 {
        a
    } else if a < 1.0 {
        let d = 1.0 - a;
        1.0 - 1.5 * d * d
    } else {
        1.0
    };
    y.copysign(x)
}

/// Overdrive effect
///
/// Parameters:
/// - Drive: input gain `1 + 9 * drive`, with makeup `1 / (1 + 0.5 * drive)`
/// - Mix: dry/wet balance
pub struct OverdriveEffect {
    base: EffectBase,
}

impl OverdriveEffect {
    pub fn new() -> Self {
        let info = EffectInfo::new("Overdrive")
            .with_param(ParamInfo::new("Drive", 0.5))
            .with_param(ParamInfo::new("Mix", 1.0).with_unit("%"));
        Self {
            base: EffectBase::new(info),
        }
    }

    #[inline]
    fn shape(x: f32, gain: f32, makeup: f32, mix: f32) -> f32 {
        let wet = soft_clip(x * gain) * makeup;
        x * (1.0 - mix) + wet * mix
    }
}

impl Default for OverdriveEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for OverdriveEffect {
    fn process(&mut self, buffer: &mut [StereoSample]) {
        if self.base.is_bypassed() {
            return;
        }
        let drive = self.base.param_actual(0);
        let mix = self.base.param_actual(1);
        let gain = 1.0 + 9.0 * drive;
        let makeup = 1.0 / (1.0 + 0.5 * drive);

        for sample in buffer.iter_mut() {
            sample.left = Self::shape(sample.left, gain, makeup, mix);
            sample.right = Self::shape(sample.right, gain, makeup, mix);
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

    fn reset(&mut self) {}
}
