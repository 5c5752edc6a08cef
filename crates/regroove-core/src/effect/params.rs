//! Lock-free effect parameter block shared between UI and audio threads

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::EffectKind;

/// Maximum parameters per unit
pub const MAX_EFFECT_PARAMS: usize = 5;

struct UnitParams {
    enabled: AtomicBool,
    values: [AtomicU32; MAX_EFFECT_PARAMS],
}

impl UnitParams {
    fn new(defaults: &[f32]) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            values: std::array::from_fn(|i| {
                AtomicU32::new(defaults.get(i).copied().unwrap_or(0.0).to_bits())
            }),
        }
    }
}

/// Effect enable flags and normalized parameters
///
/// Written by the UI at any time; read by the audio thread once per buffer.
/// Parameter changes are not ramped.
pub struct EffectParams {
    units: [UnitParams; EffectKind::COUNT],
    reset_requested: AtomicBool,
}

impl EffectParams {
    pub fn new() -> Self {
        Self {
            units: std::array::from_fn(|i| UnitParams::new(EffectKind::ALL[i].defaults())),
            reset_requested: AtomicBool::new(false),
        }
    }

    /// Set a normalized parameter (clamped to 0.0-1.0); invalid indices are ignored
    pub fn set(&self, kind: EffectKind, index: usize, value: f32) {
        if index >= kind.param_names().len() || !value.is_finite() {
            return;
        }
        self.units[kind.index()].values[index].store(value.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, kind: EffectKind, index: usize) -> f32 {
        self.units[kind.index()]
            .values
            .get(index)
            .map_or(0.0, |v| f32::from_bits(v.load(Ordering::Relaxed)))
    }

    pub fn set_enabled(&self, kind: EffectKind, enabled: bool) {
        self.units[kind.index()].enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        self.units[kind.index()].enabled.load(Ordering::Relaxed)
    }

    /// Flip a unit's enable flag; returns the new state
    pub fn toggle(&self, kind: EffectKind) -> bool {
        !self.units[kind.index()].enabled.fetch_xor(true, Ordering::Relaxed)
    }

    /// Ask the audio thread to clear all effect state before the next buffer
    pub fn request_reset(&self) {
        self.reset_requested.store(true, Ordering::Relaxed);
    }

    pub(crate) fn take_reset(&self) -> bool {
        self.reset_requested.swap(false, Ordering::Relaxed)
    }

    /// Restore every unit to its default parameters, disabled
    pub fn restore_defaults(&self) {
        for kind in EffectKind::ALL {
            self.set_enabled(kind, false);
            for (i, value) in kind.defaults().iter().enumerate() {
                self.set(kind, i, *value);
            }
        }
    }
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::new()
    }
}
