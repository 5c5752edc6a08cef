//! 3-band EQ - low shelf, mid peak, high shelf
//!
//! Each band is normalized 0..1 with 0.5 flat, mapping to ±12 dB.

use std::f32::consts::PI;

use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoSample;

/// EQ frequency centers
const EQ_LO_FREQ: f32 = 100.0; // Low shelf at 100 Hz
const EQ_MID_FREQ: f32 = 1000.0; // Mid peak at 1 kHz
const EQ_HI_FREQ: f32 = 10000.0; // High shelf at 10 kHz
const EQ_MID_Q: f32 = 0.7;

/// Maximum boost/cut per band
const EQ_RANGE_DB: f32 = 12.0;

/// Biquad filter state, both channels
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1_l: f32,
    x2_l: f32,
    y1_l: f32,
    y2_l: f32,
    x1_r: f32,
    x2_r: f32,
    y1_r: f32,
    y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input_l: f32, input_r: f32, c: &BiquadCoeffs) -> (f32, f32) {
        let out_l = c.b0 * input_l + c.b1 * self.x1_l + c.b2 * self.x2_l
            - c.a1 * self.y1_l
            - c.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = c.b0 * input_r + c.b1 * self.x1_r + c.b2 * self.x2_r
            - c.a1 * self.y1_r
            - c.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }
}

/// Biquad filter coefficients (RBJ cookbook, normalized by a0)
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    fn shelf_alpha(a: f32, sin_w0: f32) -> f32 {
        sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt()
    }

    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = Self::shelf_alpha(a, sin_w0);
        let sqrt_a = a.sqrt();

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha) / a0,
        }
    }

    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = Self::shelf_alpha(a, sin_w0);
        let sqrt_a = a.sqrt();

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * sqrt_a * alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * sqrt_a * alpha) / a0,
        }
    }

    /// Unity gain, no filtering
    fn passthrough() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

pub struct EqEffect {
    base: EffectBase,
    sample_rate: f32,
    states: [BiquadState; 3],
    coeffs: [BiquadCoeffs; 3],
}

impl EqEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = EffectInfo::new("EQ")
            .with_param(ParamInfo::new("Low", 0.5).with_range(-EQ_RANGE_DB, EQ_RANGE_DB).with_unit("dB"))
            .with_param(ParamInfo::new("Mid", 0.5).with_range(-EQ_RANGE_DB, EQ_RANGE_DB).with_unit("dB"))
            .with_param(ParamInfo::new("High", 0.5).with_range(-EQ_RANGE_DB, EQ_RANGE_DB).with_unit("dB"));
        Self {
            base: EffectBase::new(info),
            sample_rate: sample_rate.max(1) as f32,
            states: [BiquadState::default(); 3],
            coeffs: [BiquadCoeffs::passthrough(); 3],
        }
    }

    /// Recompute the coefficients of one band
    fn update_band(&mut self, band: usize) {
        let db = self.base.param_actual(band);
        let sr = self.sample_rate;
        // Near-flat bands skip filtering entirely
        self.coeffs[band] = if db.abs() <= 0.1 {
            BiquadCoeffs::passthrough()
        } else {
            match band {
                0 => BiquadCoeffs::low_shelf(EQ_LO_FREQ, db, sr),
                1 => BiquadCoeffs::peaking(EQ_MID_FREQ, db, EQ_MID_Q, sr),
                _ => BiquadCoeffs::high_shelf(EQ_HI_FREQ.min(sr * 0.45), db, sr),
            }
        };
    }
}

impl Effect for EqEffect {
    fn process(&mut self, buffer: &mut [StereoSample]) {
        if self.base.is_bypassed() {
            return;
        }
        for sample in buffer.iter_mut() {
            let (mut l, mut r) = (sample.left, sample.right);
            for (state, coeffs) in self.states.iter_mut().zip(self.coeffs.iter()) {
                (l, r) = state.process(l, r, coeffs);
            }
            sample.left = l;
            sample.right = r;
        }
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        if self.base.set_param(index, value) {
            self.update_band(index);
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        self.base.set_bypass(bypass);
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.states = [BiquadState::default(); 3];
    }
}
