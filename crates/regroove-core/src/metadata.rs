//! Per-song metadata stored next to the module as `<basename>.rgx`
//!
//! Holds pattern descriptions, the song trigger pads (S1..S16), phrases and
//! the recorded performance. Every edit rewrites the whole file.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::action::Action;
use crate::config::ini::{fields, quote, unquote, IniDocument, IniSection};
use crate::config::{write_text, PersistError};
use crate::input::DeviceFilter;
use crate::pads::{PadBank, TriggerPad};
use crate::performance::PerformanceEvent;
use crate::phrase::{Phrase, PhraseBank, PhraseStep, MAX_PHRASES, MAX_PHRASE_STEPS};
use crate::types::PADS_PER_POOL;

pub const RGX_VERSION: u32 = 1;
pub const RGX_EXTENSION: &str = "rgx";

/// Sibling metadata path for a module file
pub fn song_file_path(module: &Path) -> PathBuf {
    module.with_extension(RGX_EXTENSION)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongMetadata {
    /// Module file name recorded in the header
    pub module_file: Option<String>,
    descriptions: BTreeMap<usize, String>,
    pub pads: PadBank,
    pub phrases: PhraseBank,
}

impl SongMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(&self, pattern: usize) -> Option<&str> {
        self.descriptions.get(&pattern).map(String::as_str)
    }

    /// Set a pattern description; an empty string removes it
    pub fn set_description(&mut self, pattern: usize, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.descriptions.remove(&pattern);
        } else {
            self.descriptions.insert(pattern, text.to_string());
        }
    }

    pub fn descriptions(&self) -> impl Iterator<Item = (usize, &str)> {
        self.descriptions.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Contents of an `.rgx` file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongFile {
    pub metadata: SongMetadata,
    pub events: Vec<PerformanceEvent>,
}

/// Serialize metadata and the performance log
pub fn format_song_file(metadata: &SongMetadata, events: &[PerformanceEvent]) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_song_file(&mut out, metadata, events);
    out
}

fn write_song_file(out: &mut String, metadata: &SongMetadata, events: &[PerformanceEvent]) -> std::fmt::Result {
    writeln!(out, "[Regroove]")?;
    writeln!(out, "version={}", RGX_VERSION)?;
    if let Some(file) = &metadata.module_file {
        writeln!(out, "file={}", quote(file))?;
    }
    writeln!(out)?;

    writeln!(out, "[Patterns]")?;
    for (pattern, text) in metadata.descriptions() {
        writeln!(out, "pattern_{}={}", pattern, quote(text))?;
    }
    writeln!(out)?;

    writeln!(out, "[SongTriggerPads]")?;
    for (i, pad) in metadata.pads.iter().enumerate().filter(|(_, p)| p.is_configured()) {
        let n = i + 1;
        writeln!(out, "pad_S{}_action={}", n, pad.action)?;
        writeln!(out, "pad_S{}_parameter={}", n, pad.parameter)?;
        if let Some(note) = pad.midi_note {
            writeln!(out, "pad_S{}_midi_note={}", n, note)?;
            writeln!(out, "pad_S{}_midi_device={}", n, pad.midi_device.to_i32())?;
        }
    }
    writeln!(out)?;

    writeln!(out, "[Phrases]")?;
    writeln!(out, "phrase_count={}", metadata.phrases.len())?;
    for (i, phrase) in metadata.phrases.phrases().iter().enumerate() {
        writeln!(out, "phrase_{}_name={}", i, quote(&phrase.name))?;
        writeln!(out, "phrase_{}_step_count={}", i, phrase.steps().len())?;
        for (s, step) in phrase.steps().iter().enumerate() {
            writeln!(
                out,
                "phrase_{}_step_{}={},{},{},{}",
                i, s, step.action, step.parameter, step.value, step.position_rows
            )?;
        }
    }
    writeln!(out)?;

    writeln!(out, "[performance]")?;
    writeln!(out, "event_count={}", events.len())?;
    for event in events {
        writeln!(
            out,
            "event = {},{},{},{:.6}",
            event.row,
            event.action.id(),
            event.parameter,
            event.value
        )?;
    }
    Ok(())
}

fn format_err(line: usize, message: impl std::fmt::Display) -> PersistError {
    PersistError::Format(format!("line {line}: {message}"))
}

fn parse_num<T: std::str::FromStr>(line: usize, what: &str, value: &str) -> Result<T, PersistError> {
    value
        .parse()
        .map_err(|_| format_err(line, format!("invalid {what}: {value:?}")))
}

/// Parse `.rgx` text
pub fn parse_song_file(text: &str) -> Result<SongFile, PersistError> {
    let doc = IniDocument::parse(text).map_err(|e| PersistError::Format(e.to_string()))?;
    let mut song = SongFile::default();

    if let Some(header) = doc.section("Regroove") {
        if let Some(version) = header.get("version") {
            let version: u32 = parse_num(0, "version", version)?;
            if version > RGX_VERSION {
                log::warn!("Song file version {} is newer than {}, reading anyway", version, RGX_VERSION);
            }
        }
        song.metadata.module_file = header.get("file").map(unquote);
    }

    if let Some(section) = doc.section("Patterns") {
        for entry in &section.entries {
            let Some(index) = entry.key.strip_prefix("pattern_") else {
                continue;
            };
            let pattern: usize = parse_num(entry.line, "pattern index", index)?;
            song.metadata.set_description(pattern, &unquote(&entry.value));
        }
    }

    if let Some(section) = doc.section("SongTriggerPads") {
        parse_pads(section, &mut song.metadata.pads)?;
    }
    if let Some(section) = doc.section("Phrases") {
        song.metadata.phrases = parse_phrases(section)?;
    }
    if let Some(section) = doc.section("performance") {
        song.events = parse_events(section)?;
    }
    Ok(song)
}

fn parse_pads(section: &IniSection, pads: &mut PadBank) -> Result<(), PersistError> {
    for entry in &section.entries {
        let Some((number, field)) = entry
            .key
            .strip_prefix("pad_S")
            .and_then(|rest| rest.split_once('_'))
        else {
            continue;
        };
        let number: usize = parse_num(entry.line, "pad number", number)?;
        if !(1..=PADS_PER_POOL).contains(&number) {
            return Err(format_err(entry.line, format!("pad S{number} out of range")));
        }
        let pad: &mut TriggerPad = &mut pads[number - 1];
        match field {
            "action" => match Action::from_name(&entry.value) {
                Some(action) => pad.action = action,
                None => log::warn!("Song pad S{}: unknown action {:?}", number, entry.value),
            },
            "parameter" => pad.parameter = parse_num(entry.line, "parameter", &entry.value)?,
            "midi_note" => {
                let note: i32 = parse_num(entry.line, "midi note", &entry.value)?;
                pad.midi_note = u8::try_from(note).ok().filter(|n| *n <= 127);
            }
            "midi_device" => {
                let device: i32 = parse_num(entry.line, "midi device", &entry.value)?;
                pad.midi_device = DeviceFilter::from_i32(device);
            }
            other => log::debug!("Song pad S{}: ignoring field {:?}", number, other),
        }
    }
    Ok(())
}

fn parse_phrases(section: &IniSection) -> Result<PhraseBank, PersistError> {
    let mut bank = PhraseBank::new();
    let count: usize = match section.get("phrase_count") {
        Some(v) => parse_num(0, "phrase count", v)?,
        None => return Ok(bank),
    };
    if count > MAX_PHRASES {
        log::warn!("Song file has {} phrases, keeping {}", count, MAX_PHRASES);
    }

    for i in 0..count.min(MAX_PHRASES) {
        let name = section
            .get(&format!("phrase_{i}_name"))
            .map(unquote)
            .unwrap_or_default();
        let steps: usize = match section.get(&format!("phrase_{i}_step_count")) {
            Some(v) => parse_num(0, "step count", v)?,
            None => 0,
        };

        let mut phrase = Phrase::new(name);
        for s in 0..steps.min(MAX_PHRASE_STEPS) {
            let key = format!("phrase_{i}_step_{s}");
            let value = section
                .get(&key)
                .ok_or_else(|| PersistError::Format(format!("missing {key}")))?;
            let f = fields(value);
            let [action, parameter, value, position] = f.as_slice() else {
                return Err(PersistError::Format(format!(
                    "{key}: expected <action>,<parameter>,<value>,<position>"
                )));
            };
            let Some(action) = Action::from_name(action) else {
                log::warn!("Phrase {}: unknown action {:?}, step skipped", i, action);
                continue;
            };
            phrase.add_step(PhraseStep::new(
                action,
                parse_num(0, "parameter", parameter)?,
                parse_num(0, "value", value)?,
                parse_num(0, "position", position)?,
            ));
        }
        bank.add(phrase);
    }
    Ok(bank)
}

fn parse_events(section: &IniSection) -> Result<Vec<PerformanceEvent>, PersistError> {
    let mut events = Vec::new();
    for entry in section.entries.iter().filter(|e| e.key == "event") {
        let f = fields(&entry.value);
        let [row, action, parameter, value] = f.as_slice() else {
            return Err(format_err(entry.line, "expected <row>,<action>,<parameter>,<value>"));
        };
        let id: i32 = parse_num(entry.line, "action id", action)?;
        let Some(action) = Action::from_id(id) else {
            log::warn!("Performance: unknown action id {} at line {}, skipped", id, entry.line);
            continue;
        };
        events.push(PerformanceEvent {
            row: parse_num(entry.line, "row", row)?,
            action,
            parameter: parse_num(entry.line, "parameter", parameter)?,
            value: parse_num(entry.line, "value", value)?,
        });
    }

    if let Some(count) = section.get("event_count") {
        let count: usize = parse_num(0, "event count", count)?;
        if count != events.len() {
            log::warn!("Performance: event_count {} but {} events read", count, events.len());
        }
    }
    Ok(events)
}

/// Load a song file; a missing file yields `Ok(None)`
pub fn load_song_file(path: &Path) -> Result<Option<SongFile>, PersistError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let song = parse_song_file(&text)?;
    log::info!(
        "Loaded song metadata from {:?} ({} phrases, {} events)",
        path,
        song.metadata.phrases.len(),
        song.events.len()
    );
    Ok(Some(song))
}

pub fn save_song_file(path: &Path, metadata: &SongMetadata, events: &[PerformanceEvent]) -> Result<(), PersistError> {
    write_text(path, &format_song_file(metadata, events))?;
    log::debug!("Saved song metadata to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SongMetadata, Vec<PerformanceEvent>) {
        let mut meta = SongMetadata::new();
        meta.module_file = Some("drop \"final\".xm".to_string());
        meta.set_description(0, "Intro");
        meta.set_description(12, "Break, with comma");
        meta.pads[0] = TriggerPad::new(Action::TriggerPhrase, 1).with_note(60, DeviceFilter::Port(1));
        meta.pads[15] = TriggerPad::new(Action::MuteAll, 0);

        let mut build = Phrase::new("Build");
        build.add_step(PhraseStep::new(Action::Play, 0, 127, 0));
        build.add_step(PhraseStep::new(Action::ChannelVolume, 2, 40, 16));
        meta.phrases.add(build);
        meta.phrases.add(Phrase::new("Empty"));

        let events = vec![
            PerformanceEvent {
                row: 0,
                action: Action::ChannelMute,
                parameter: 2,
                value: 127.0,
            },
            PerformanceEvent {
                row: 8,
                action: Action::PitchSet,
                parameter: 0,
                value: 33.0,
            },
        ];
        (meta, events)
    }

    #[test]
    fn test_song_file_roundtrip() {
        let (meta, events) = sample();
        let text = format_song_file(&meta, &events);
        let parsed = parse_song_file(&text).unwrap();

        assert_eq!(parsed.metadata, meta);
        assert_eq!(parsed.events, events);
        assert_eq!(format_song_file(&parsed.metadata, &parsed.events), text);
    }

    #[test]
    fn test_format_details() {
        let (meta, events) = sample();
        let text = format_song_file(&meta, &events);
        assert!(text.contains("version=1"));
        assert!(text.contains("pattern_12=\"Break, with comma\""));
        assert!(text.contains("pad_S1_midi_note=60"));
        assert!(text.contains("pad_S16_action=mute_all"));
        assert!(!text.contains("pad_S16_midi_note"));
        assert!(text.contains("phrase_0_step_1=channel_volume,2,40,16"));
        assert!(text.contains("event_count=2"));
        assert!(text.contains(&format!("event = 0,{},2,127.000000", Action::ChannelMute.id())));
    }

    #[test]
    fn test_unknown_entries_tolerated() {
        let text = "[Regroove]\nversion=1\n\n[SongTriggerPads]\npad_S2_action=fly\npad_S2_parameter=4\n\n[performance]\nevent_count=2\nevent = 0,9999,0,1.0\nevent = 4,1,0,127.0\n";
        let song = parse_song_file(text).unwrap();
        assert_eq!(song.metadata.pads[1].action, Action::None);
        assert_eq!(song.metadata.pads[1].parameter, 4);
        assert_eq!(song.events.len(), 1);
        assert_eq!(song.events[0].action, Action::Play);
    }

    #[test]
    fn test_malformed_is_format_error() {
        let text = "[performance]\nevent = 0,1\n";
        assert!(matches!(parse_song_file(text), Err(PersistError::Format(_))));
        let text = "[SongTriggerPads]\npad_S17_action=play\n";
        assert!(parse_song_file(text).is_err());
    }

    #[test]
    fn test_description_edit() {
        let mut meta = SongMetadata::new();
        meta.set_description(3, "  Verse ");
        assert_eq!(meta.description(3), Some("Verse"));
        meta.set_description(3, "");
        assert_eq!(meta.description(3), None);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("song.mod");
        let path = song_file_path(&module);
        assert!(path.ends_with("song.rgx"));
        assert!(load_song_file(&path).unwrap().is_none());

        let (meta, events) = sample();
        save_song_file(&path, &meta, &events).unwrap();
        let loaded = load_song_file(&path).unwrap().unwrap();
        assert_eq!(loaded.metadata, meta);
    }
}
