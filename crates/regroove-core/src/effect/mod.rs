//! Effect system - traits, parameter mapping, and the output chain
//!
//! Every effect exposes normalized parameters (0.0-1.0) so that MIDI CC
//! values and UI sliders map onto them directly. The UI writes parameters
//! into a shared [`EffectParams`] block; the audio thread's
//! [`EffectsChain`] picks them up at the start of each buffer.

mod chain;
pub mod native;
mod params;

pub use chain::EffectsChain;
pub use params::{EffectParams, MAX_EFFECT_PARAMS};

use serde::{Deserialize, Serialize};

use crate::types::StereoSample;

/// Static description of one unit parameter
///
/// Controls always deliver 0.0-1.0; `min..max` is the range the unit
/// actually works in (dB, ratio, seconds...).
#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    /// Normalized default
    pub default: f32,
    pub min: f32,
    pub max: f32,
    /// Display suffix, empty when unitless
    pub unit: String,
}

impl ParamInfo {
    /// A unitless 0..1 parameter
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }

    pub fn with_range(self, min: f32, max: f32) -> Self {
        Self { min, max, ..self }
    }

    pub fn with_unit(self, unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..self
        }
    }

    /// Map a normalized control value into the working range
    pub fn scale(&self, normalized: f32) -> f32 {
        self.min + normalized.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

/// A parameter's control position and the working value derived from it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValue {
    pub normalized: f32,
    pub actual: f32,
}

impl ParamValue {
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        Self {
            normalized: normalized.clamp(0.0, 1.0),
            actual: info.scale(normalized),
        }
    }
}

/// Name and parameter layout of a unit
#[derive(Debug, Clone)]
pub struct EffectInfo {
    pub name: String,
    /// In parameter index order, matching [`EffectKind::param_names`]
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// A unit of the output chain
///
/// Units process stereo frames in place at the chain's sample rate. They
/// are only touched from the audio thread.
pub trait Effect: Send {
    fn process(&mut self, buffer: &mut [StereoSample]);

    fn info(&self) -> &EffectInfo;

    fn get_params(&self) -> &[ParamValue];

    /// Set a normalized parameter; out-of-range indices are ignored
    fn set_param(&mut self, index: usize, value: f32);

    fn set_bypass(&mut self, bypass: bool);

    fn is_bypassed(&self) -> bool;

    /// Clear internal state (filter memory, delay lines, envelopes)
    fn reset(&mut self);
}

/// Parameter and bypass bookkeeping shared by the native units
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    values: Vec<ParamValue>,
    bypassed: bool,
}

impl EffectBase {
    pub fn new(info: EffectInfo) -> Self {
        let values = info
            .params
            .iter()
            .map(|p| ParamValue::from_normalized(p.default, p))
            .collect();
        Self {
            info,
            values,
            bypassed: false,
        }
    }

    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    pub fn get_params(&self) -> &[ParamValue] {
        &self.values
    }

    /// Returns `false` for an index the unit does not have
    pub fn set_param(&mut self, index: usize, value: f32) -> bool {
        let Some(info) = self.info.params.get(index) else {
            return false;
        };
        self.values[index] = ParamValue::from_normalized(value, info);
        true
    }

    /// Working-range value of a parameter (0.0 for an unknown index)
    pub fn param_actual(&self, index: usize) -> f32 {
        self.values.get(index).map_or(0.0, |v| v.actual)
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}

/// The effect units of the output chain, in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Overdrive,
    Filter,
    Eq,
    Compressor,
    Delay,
}

impl EffectKind {
    pub const COUNT: usize = 5;

    pub const ALL: [EffectKind; Self::COUNT] = [
        EffectKind::Overdrive,
        EffectKind::Filter,
        EffectKind::Eq,
        EffectKind::Compressor,
        EffectKind::Delay,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in action names and config keys (`fx_<name>_<param>`)
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Overdrive => "overdrive",
            EffectKind::Filter => "filter",
            EffectKind::Eq => "eq",
            EffectKind::Compressor => "compressor",
            EffectKind::Delay => "delay",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Parameter names in index order
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            EffectKind::Overdrive => &["drive", "mix"],
            EffectKind::Filter => &["cutoff", "resonance"],
            EffectKind::Eq => &["low", "mid", "high"],
            EffectKind::Compressor => &["threshold", "ratio", "attack", "release", "makeup"],
            EffectKind::Delay => &["time", "feedback", "mix"],
        }
    }

    pub fn param_index(self, name: &str) -> Option<usize> {
        self.param_names().iter().position(|p| *p == name)
    }

    /// Default normalized parameter values in index order
    pub fn defaults(self) -> &'static [f32] {
        match self {
            EffectKind::Overdrive => &[0.5, 1.0],
            EffectKind::Filter => &[1.0, 0.0],
            EffectKind::Eq => &[0.5, 0.5, 0.5],
            EffectKind::Compressor => &[0.5, 0.25, 0.1, 0.3, 0.0],
            EffectKind::Delay => &[0.25, 0.4, 0.3],
        }
    }

    /// Build the unit for this kind
    pub fn create(self, sample_rate: u32) -> Box<dyn Effect> {
        match self {
            EffectKind::Overdrive => Box::new(native::OverdriveEffect::new()),
            EffectKind::Filter => Box::new(native::ResonantFilterEffect::new(sample_rate)),
            EffectKind::Eq => Box::new(native::EqEffect::new(sample_rate)),
            EffectKind::Compressor => Box::new(native::CompressorEffect::new(sample_rate)),
            EffectKind::Delay => Box::new(native::DelayEffect::new(sample_rate)),
        }
    }
}
