//! Global configuration: devices, key/MIDI bindings, application pads, effects

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::ini::{fields, ConfigParseError, IniDocument, IniSection};
use crate::action::Action;
use crate::effect::{EffectKind, EffectParams, MAX_EFFECT_PARAMS};
use crate::input::{DeviceFilter, KeyCode, KeyboardMap, MidiMap, MidiMapping, DEFAULT_CC_THRESHOLD};
use crate::pads::{PadBank, TriggerPad};
use crate::types::PADS_PER_POOL;

/// Device selection; `-1` means "system default" for audio and "none"
/// for MIDI ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub midi_device_0: i32,
    pub midi_device_1: i32,
    pub audio_device: i32,
    pub midi_output_device: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            midi_device_0: 0,
            midi_device_1: -1,
            audio_device: -1,
            midi_output_device: -1,
        }
    }
}

impl DeviceConfig {
    /// Configured MIDI input ports, in device-id order
    pub fn midi_inputs(&self) -> [Option<usize>; 2] {
        [self.midi_device_0, self.midi_device_1].map(|p| usize::try_from(p).ok())
    }

    pub fn midi_output(&self) -> Option<usize> {
        usize::try_from(self.midi_output_device).ok()
    }

    pub fn audio(&self) -> Option<usize> {
        usize::try_from(self.audio_device).ok()
    }
}

/// Startup values for the effects chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    pub enabled: [bool; EffectKind::COUNT],
    pub values: [[f32; MAX_EFFECT_PARAMS]; EffectKind::COUNT],
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            enabled: [false; EffectKind::COUNT],
            values: std::array::from_fn(|i| {
                let defaults = EffectKind::ALL[i].defaults();
                std::array::from_fn(|p| defaults.get(p).copied().unwrap_or(0.0))
            }),
        }
    }
}

impl EffectSettings {
    pub fn apply_to(&self, params: &EffectParams) {
        for kind in EffectKind::ALL {
            params.set_enabled(kind, self.enabled[kind.index()]);
            for p in 0..kind.param_names().len() {
                params.set(kind, p, self.values[kind.index()][p]);
            }
        }
    }

    pub fn capture(params: &EffectParams) -> Self {
        let mut settings = Self::default();
        for kind in EffectKind::ALL {
            settings.enabled[kind.index()] = params.is_enabled(kind);
            for p in 0..kind.param_names().len() {
                settings.values[kind.index()][p] = params.get(kind, p);
            }
        }
        settings
    }
}

/// Everything stored in `regroove.ini`
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub devices: DeviceConfig,
    pub keyboard: KeyboardMap,
    pub midi: MidiMap,
    /// Application pads A1..A16
    pub pads: PadBank,
    pub effects: EffectSettings,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            devices: DeviceConfig::default(),
            keyboard: KeyboardMap::with_defaults(),
            midi: MidiMap::with_defaults(),
            pads: PadBank::default(),
            effects: EffectSettings::default(),
        }
    }
}

impl GlobalConfig {
    /// Parse the INI text
    ///
    /// Sections that are absent keep their built-in defaults. Malformed
    /// lines are errors; unknown action names are skipped with a warning.
    pub fn parse(text: &str) -> Result<Self, ConfigParseError> {
        let doc = IniDocument::parse(text)?;
        let mut config = GlobalConfig::default();

        if let Some(section) = doc.section("devices") {
            parse_devices(section, &mut config.devices)?;
        }
        if let Some(section) = doc.section("keyboard") {
            config.keyboard = parse_keyboard(section)?;
        }
        if let Some(section) = doc.section("midi") {
            config.midi = parse_midi(section)?;
        }
        if let Some(section) = doc.section("trigger_pads") {
            config.pads = parse_pads(section)?;
        }
        if let Some(section) = doc.section("effects") {
            parse_effects(section, &mut config.effects)?;
        }
        Ok(config)
    }

    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail
        let _ = self.write_ini(&mut out);
        out
    }

    fn write_ini(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "; regroove configuration")?;
        writeln!(out)?;

        writeln!(out, "[devices]")?;
        writeln!(out, "midi_device_0 = {}", self.devices.midi_device_0)?;
        writeln!(out, "midi_device_1 = {}", self.devices.midi_device_1)?;
        writeln!(out, "audio_device = {}", self.devices.audio_device)?;
        writeln!(out, "midi_output_device = {}", self.devices.midi_output_device)?;
        writeln!(out)?;

        writeln!(out, "[keyboard]")?;
        for binding in self.keyboard.bindings() {
            writeln!(out, "{} = {},{}", binding.key.config_key(), binding.action, binding.parameter)?;
        }
        writeln!(out)?;

        writeln!(out, "[midi]")?;
        for m in self.midi.mappings() {
            write!(
                out,
                "cc{} = {},{},{},{}",
                m.cc,
                m.action,
                m.parameter,
                u8::from(m.continuous),
                m.device.to_i32()
            )?;
            if m.threshold != DEFAULT_CC_THRESHOLD {
                write!(out, ",{}", m.threshold)?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;

        writeln!(out, "[trigger_pads]")?;
        for (i, pad) in self.pads.iter().enumerate().filter(|(_, p)| p.is_configured()) {
            writeln!(
                out,
                "pad{} = {},{},{},{}",
                i,
                pad.midi_note.map_or(-1, i32::from),
                pad.action,
                pad.parameter,
                pad.midi_device.to_i32()
            )?;
        }
        writeln!(out)?;

        writeln!(out, "[effects]")?;
        for kind in EffectKind::ALL {
            let unit = kind.index();
            writeln!(out, "fx_{}_enabled = {}", kind.name(), u8::from(self.effects.enabled[unit]))?;
            for (p, name) in kind.param_names().iter().enumerate() {
                writeln!(out, "fx_{}_{} = {:.3}", kind.name(), name, self.effects.values[unit][p])?;
            }
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(line: usize, what: &str, value: &str) -> Result<T, ConfigParseError> {
    value
        .parse()
        .map_err(|_| ConfigParseError::new(line, format!("invalid {what}: {value:?}")))
}

fn parse_action(line: usize, name: &str) -> Option<Action> {
    let action = Action::from_name(name);
    if action.is_none() {
        log::warn!("load_config: line {}: unknown action {:?}, skipped", line, name);
    }
    action
}

fn parse_devices(section: &IniSection, devices: &mut DeviceConfig) -> Result<(), ConfigParseError> {
    for entry in &section.entries {
        let target = match entry.key.as_str() {
            "midi_device_0" => &mut devices.midi_device_0,
            "midi_device_1" => &mut devices.midi_device_1,
            "audio_device" => &mut devices.audio_device,
            "midi_output_device" => &mut devices.midi_output_device,
            other => {
                log::debug!("load_config: ignoring unknown device key {:?}", other);
                continue;
            }
        };
        *target = parse_field(entry.line, "device index", &entry.value)?;
    }
    Ok(())
}

fn parse_keyboard(section: &IniSection) -> Result<KeyboardMap, ConfigParseError> {
    let mut map = KeyboardMap::new();
    for entry in &section.entries {
        let key = KeyCode::from_config_key(&entry.key)
            .ok_or_else(|| ConfigParseError::new(entry.line, format!("unknown key {:?}", entry.key)))?;
        let f = fields(&entry.value);
        let (name, parameter) = match f.as_slice() {
            [name] => (*name, 0),
            [name, param] => (*name, parse_field(entry.line, "parameter", param)?),
            _ => return Err(ConfigParseError::new(entry.line, "expected <action>,<parameter>")),
        };
        if let Some(action) = parse_action(entry.line, name) {
            map.bind(key, action, parameter);
        }
    }
    Ok(map)
}

fn parse_midi(section: &IniSection) -> Result<MidiMap, ConfigParseError> {
    let mut map = MidiMap::new();
    for entry in &section.entries {
        let cc: u8 = entry
            .key
            .strip_prefix("cc")
            .ok_or_else(|| ConfigParseError::new(entry.line, format!("expected cc<N>, got {:?}", entry.key)))
            .and_then(|n| parse_field(entry.line, "cc number", n))?;
        if cc > 127 {
            return Err(ConfigParseError::new(entry.line, format!("cc {cc} out of range")));
        }

        let f = fields(&entry.value);
        if !(4..=5).contains(&f.len()) {
            return Err(ConfigParseError::new(
                entry.line,
                "expected <action>,<parameter>,<continuous>,<device>[,<threshold>]",
            ));
        }
        let parameter: i32 = parse_field(entry.line, "parameter", f[1])?;
        let continuous: u8 = parse_field(entry.line, "continuous flag", f[2])?;
        let device: i32 = parse_field(entry.line, "device", f[3])?;
        let threshold: u8 = match f.get(4) {
            Some(t) => parse_field(entry.line, "threshold", t)?,
            None => DEFAULT_CC_THRESHOLD,
        };

        if let Some(action) = parse_action(entry.line, f[0]) {
            map.add(
                MidiMapping::new(cc, action, parameter)
                    .with_continuous(continuous != 0)
                    .with_device(DeviceFilter::from_i32(device))
                    .with_threshold(threshold.min(127)),
            );
        }
    }
    Ok(map)
}

fn parse_pads(section: &IniSection) -> Result<PadBank, ConfigParseError> {
    let mut pads = PadBank::default();
    for entry in &section.entries {
        let index: usize = entry
            .key
            .strip_prefix("pad")
            .ok_or_else(|| ConfigParseError::new(entry.line, format!("expected pad<N>, got {:?}", entry.key)))
            .and_then(|n| parse_field(entry.line, "pad index", n))?;
        if index >= PADS_PER_POOL {
            return Err(ConfigParseError::new(entry.line, format!("pad {index} out of range")));
        }

        let f = fields(&entry.value);
        let [note, name, param, device] = f.as_slice() else {
            return Err(ConfigParseError::new(
                entry.line,
                "expected <midi_note>,<action>,<parameter>,<device>",
            ));
        };
        let note: i32 = parse_field(entry.line, "midi note", note)?;
        let parameter: i32 = parse_field(entry.line, "parameter", param)?;
        let device: i32 = parse_field(entry.line, "device", device)?;

        if let Some(action) = parse_action(entry.line, name) {
            pads[index] = TriggerPad {
                action,
                parameter,
                midi_note: u8::try_from(note).ok().filter(|n| *n <= 127),
                midi_device: DeviceFilter::from_i32(device),
            };
        }
    }
    Ok(pads)
}

fn parse_effects(section: &IniSection, effects: &mut EffectSettings) -> Result<(), ConfigParseError> {
    for entry in &section.entries {
        let Some(rest) = entry.key.strip_prefix("fx_") else {
            log::debug!("load_config: ignoring unknown effects key {:?}", entry.key);
            continue;
        };
        let Some((kind, param)) = EffectKind::ALL.iter().find_map(|k| {
            rest.strip_prefix(k.name())
                .and_then(|p| p.strip_prefix('_'))
                .map(|p| (*k, p))
        }) else {
            log::warn!("load_config: line {}: unknown effect key {:?}", entry.line, entry.key);
            continue;
        };

        if param == "enabled" {
            let flag: u8 = parse_field(entry.line, "enable flag", &entry.value)?;
            effects.enabled[kind.index()] = flag != 0;
        } else if let Some(p) = kind.param_index(param) {
            let value: f32 = parse_field(entry.line, "effect value", &entry.value)?;
            if !value.is_finite() {
                return Err(ConfigParseError::new(entry.line, "effect value must be finite"));
            }
            effects.values[kind.index()][p] = value.clamp(0.0, 1.0);
        } else {
            log::warn!("load_config: line {}: unknown effect parameter {:?}", entry.line, entry.key);
        }
    }
    Ok(())
}
