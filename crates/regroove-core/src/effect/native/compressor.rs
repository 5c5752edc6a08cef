//! Feed-forward peak compressor

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoSample;

/// Stereo-linked compressor
///
/// Parameters:
/// - Threshold: -40..0 dB
/// - Ratio: 1:1..20:1
/// - Attack: 0.1..100 ms
/// - Release: 10..1000 ms
/// - Makeup: 0..24 dB
pub struct CompressorEffect {
    base: EffectBase,
    sample_rate: f32,
    envelope: f32,
}

impl CompressorEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = EffectInfo::new("Compressor")
            .with_param(ParamInfo::new("Threshold", 0.5).with_range(-40.0, 0.0).with_unit("dB"))
            .with_param(ParamInfo::new("Ratio", 0.25).with_range(1.0, 20.0))
            .with_param(ParamInfo::new("Attack", 0.1).with_range(0.1, 100.0).with_unit("ms"))
            .with_param(ParamInfo::new("Release", 0.3).with_range(10.0, 1000.0).with_unit("ms"))
            .with_param(ParamInfo::new("Makeup", 0.0).with_range(0.0, 24.0).with_unit("dB"));
        Self {
            base: EffectBase::new(info),
            sample_rate: sample_rate.max(1) as f32,
            envelope: 0.0,
        }
    }

    /// One-pole smoothing coefficient for a time constant in ms
    fn time_coeff(&self, ms: f32) -> f32 {
        (-1.0 / (ms * 0.001 * self.sample_rate)).exp()
    }

    /// Gain reduction in dB for a level in dB
    fn reduction_db(level_db: f32, threshold_db: f32, ratio: f32) -> f32 {
        let over = level_db - threshold_db;
        if over > 0.0 {
            -over * (1.0 - 1.0 / ratio)
        } else {
            0.0
        }
    }
}

impl Effect for CompressorEffect {
    fn process(&mut self, buffer: &mut [StereoSample]) {
        if self.base.is_bypassed() {
            return;
        }
        let threshold = self.base.param_actual(0);
        let ratio = self.base.param_actual(1).max(1.0);
        let attack = self.time_coeff(self.base.param_actual(2));
        let release = self.time_coeff(self.base.param_actual(3));
        let makeup = self.base.param_actual(4);

        for sample in buffer.iter_mut() {
            let level = sample.peak();
            let coeff = if level > self.envelope { attack } else { release };
            self.envelope = level + coeff * (self.envelope - level);

            let level_db = 20.0 * self.envelope.max(1e-6).log10();
            let gain_db = Self::reduction_db(level_db, threshold, ratio) + makeup;
            let gain = 10.0_f32.powf(gain_db / 20.0);

            sample.left *= gain;
            sample.right *= gain;
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
        self.envelope = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_RATE;

    #[test]
    fn test_reduction_curve() {
        assert_eq!(CompressorEffect::reduction_db(-30.0, -20.0, 4.0), 0.0);
        assert!((CompressorEffect::reduction_db(-10.0, -20.0, 4.0) + 7.5).abs() < 1e-5);
        assert_eq!(CompressorEffect::reduction_db(0.0, -20.0, 1.0), 0.0);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let mut effect = CompressorEffect::new(SAMPLE_RATE);
        effect.set_param(0, 0.5); // -20 dB
        effect.set_param(1, 1.0); // 20:1

        let mut buffer = vec![StereoSample::new(0.9, 0.9); 4800];
        effect.process(&mut buffer);
        assert!(buffer[4799].left < 0.3);
    }

    #[test]
    fn test_quiet_signal_untouched() {
        let mut effect = CompressorEffect::new(SAMPLE_RATE);
        effect.set_param(0, 1.0); // 0 dB threshold

        let mut buffer = vec![StereoSample::new(0.1, 0.1); 256];
        effect.process(&mut buffer);
        assert!((buffer[255].left - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_reset_clears_envelope() {
        let mut effect = CompressorEffect::new(SAMPLE_RATE);
        let mut buffer = vec![StereoSample::new(1.0, 1.0); 256];
        effect.process(&mut buffer);
        assert!(effect.envelope > 0.0);
        effect.reset();
        assert_eq!(effect.envelope, 0.0);
    }
}
