//! Stereo delay with feedback and dry/wet mix

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoSample;

/// Maximum delay time in seconds
const MAX_DELAY_SECONDS: f32 = 1.0;

/// Stereo delay line
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer_l: vec![0.0; capacity],
            buffer_r: vec![0.0; capacity],
            write_pos: 0,
            delay_samples: capacity / 4,
        }
    }

    fn capacity(&self) -> usize {
        self.buffer_l.len()
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.capacity() - 1);
    }

    /// Read from delay line at current position minus delay
    #[inline]
    fn read(&self) -> (f32, f32) {
        let read_pos = (self.write_pos + self.capacity() - self.delay_samples) % self.capacity();
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    /// Write to delay line and advance position
    #[inline]
    fn write(&mut self, left: f32, right: f32) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        self.write_pos = (self.write_pos + 1) % self.capacity();
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Stereo delay
///
/// Parameters:
/// - Time: 10..1000 ms
/// - Feedback: 0..95%
/// - Mix: dry/wet balance
pub struct DelayEffect {
    base: EffectBase,
    sample_rate: f32,
    line: DelayLine,
}

impl DelayEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = EffectInfo::new("Delay")
            .with_param(ParamInfo::new("Time", 0.25).with_range(10.0, 1000.0).with_unit("ms"))
            .with_param(ParamInfo::new("Feedback", 0.4).with_range(0.0, 0.95).with_unit("%"))
            .with_param(ParamInfo::new("Mix", 0.3).with_unit("%"));
        let sample_rate = sample_rate.max(1) as f32;
        let mut effect = Self {
            base: EffectBase::new(info),
            sample_rate,
            line: DelayLine::new((sample_rate * MAX_DELAY_SECONDS) as usize + 1),
        };
        effect.update_time();
        effect
    }

    fn update_time(&mut self) {
        let ms = self.base.param_actual(0);
        self.line
            .set_delay_samples((ms * 0.001 * self.sample_rate).round() as usize);
    }
}

impl Effect for DelayEffect {
    fn process(&mut self, buffer: &mut [StereoSample]) {
        if self.base.is_bypassed() {
            return;
        }
        let feedback = self.base.param_actual(1);
        let mix = self.base.param_actual(2);

        for sample in buffer.iter_mut() {
            let (delayed_l, delayed_r) = self.line.read();
            self.line
                .write(sample.left + delayed_l * feedback, sample.right + delayed_r * feedback);
            sample.left = sample.left * (1.0 - mix) + delayed_l * mix;
            sample.right = sample.right * (1.0 - mix) + delayed_r * mix;
        }
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if self.base.set_param(index, value) && index == 0 {
            self.update_time();
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}
