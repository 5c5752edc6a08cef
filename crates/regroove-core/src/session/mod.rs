//! Session: the shared state every frontend drives
//!
//! Owns the UI side of the engine (command handle, event consumer), the
//! configuration, the current song's metadata, the performance recorder,
//! the phrase engine, learn mode and the file list. Frontends feed it
//! input ([`Session::handle_key`], [`Session::handle_midi`]) and call
//! [`Session::poll`] once per UI tick.

mod dispatch;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::audio::{AudioProcessor, SharedProcessor};
use crate::config::{save_config, GlobalConfig, PersistError};
use crate::effect::EffectParams;
use crate::engine::{
    command_channel, event_channel, EngineAtomics, EngineHandle, LoadError, ModuleLoader, PlaybackEvent,
};
use crate::files::FileList;
use crate::input::{DeviceFilter, KeyCode, LearnState, LearnTarget, MidiEvent, MidiMapping, MidiMessage};
use crate::metadata::{load_song_file, save_song_file, song_file_path, SongMetadata};
use crate::action::{Action, ActionEvent, DispatchContext};
use crate::pads::{find_pad_for_note, PadRef, TriggerPad};
use crate::performance::{Performance, PerformanceEvent};
use crate::phrase::{Phrase, PhraseEngine, PhraseStep};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load module: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub struct Session {
    handle: EngineHandle,
    processor: SharedProcessor,
    events: rtrb::Consumer<PlaybackEvent>,
    loader: Box<dyn ModuleLoader>,

    config: GlobalConfig,
    config_path: Option<PathBuf>,
    effects: Arc<EffectParams>,

    module_path: Option<PathBuf>,
    metadata: SongMetadata,
    /// The module's `.rgx` failed to parse; set aside before the next save
    song_file_unreadable: bool,
    performance: Performance,
    phrases: PhraseEngine,
    files: FileList,
    learn: LearnState,

    // Transport intent, mirrored ahead of the audio thread
    playing: bool,
    pattern_mode: bool,
    /// Pitch slider position in [-1, 1]; pitch factor is 2^position
    pitch_slider: f64,
    quit_requested: bool,
}

impl Session {
    pub fn new(sample_rate: u32, loader: Box<dyn ModuleLoader>, config: GlobalConfig) -> Self {
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let atomics = Arc::new(EngineAtomics::new());
        let effects = Arc::new(EffectParams::new());
        config.effects.apply_to(&effects);

        let processor = AudioProcessor::new(sample_rate, command_rx, event_tx, atomics.clone(), effects.clone());

        Self {
            handle: EngineHandle::new(command_tx, atomics),
            processor: Arc::new(Mutex::new(processor)),
            events: event_rx,
            loader,
            config,
            config_path: None,
            effects,
            module_path: None,
            metadata: SongMetadata::new(),
            song_file_unreadable: false,
            performance: Performance::new(),
            phrases: PhraseEngine::new(),
            files: FileList::default(),
            learn: LearnState::new(),
            playing: false,
            pattern_mode: false,
            pitch_slider: 0.0,
            quit_requested: false,
        }
    }

    /// Persist configuration changes (learn mode, pads) to `path`
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    /// Processor handed to the audio backend
    pub fn processor(&self) -> SharedProcessor {
        self.processor.clone()
    }

    pub fn atomics(&self) -> &Arc<EngineAtomics> {
        self.handle.atomics()
    }

    pub fn effect_params(&self) -> &Arc<EffectParams> {
        &self.effects
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn metadata(&self) -> &SongMetadata {
        &self.metadata
    }

    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    pub fn phrase_engine(&self) -> &PhraseEngine {
        &self.phrases
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }

    pub fn learn(&self) -> &LearnState {
        &self.learn
    }

    pub fn module_path(&self) -> Option<&Path> {
        self.module_path.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_pattern_mode(&self) -> bool {
        self.pattern_mode
    }

    pub fn pitch_slider(&self) -> f64 {
        self.pitch_slider
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn dropped_commands(&self) -> u64 {
        self.handle.dropped_commands()
    }

    // ─────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────

    /// List module files of a directory (or of a file's directory)
    pub fn scan_files(&mut self, path: &Path) {
        self.files = FileList::scan(path);
    }

    /// Load a module and its `.rgx` metadata
    ///
    /// On failure the current module stays loaded. Playback is stopped;
    /// all loop, mixer and pitch state is reset.
    pub fn load_module(&mut self, path: &Path) -> Result<(), SessionError> {
        let renderer = self.loader.load(path)?;
        log::info!(
            "Loaded {:?}: {} orders, {} channels",
            path,
            renderer.num_orders(),
            renderer.num_channels()
        );

        let old = {
            let mut processor = self.processor.lock().unwrap_or_else(PoisonError::into_inner);
            processor.load(renderer)
        };
        drop(old);

        // Events still queued belong to the previous module
        while self.events.pop().is_ok() {}

        self.phrases.cancel();
        self.playing = false;
        self.pattern_mode = false;
        self.pitch_slider = 0.0;

        self.song_file_unreadable = false;
        let (metadata, events) = match load_song_file(&song_file_path(path)) {
            Ok(Some(song)) => (song.metadata, song.events),
            Ok(None) => (SongMetadata::new(), Vec::new()),
            Err(e) => {
                log::warn!("Ignoring song metadata for {:?}: {}", path, e);
                self.song_file_unreadable = true;
                (SongMetadata::new(), Vec::new())
            }
        };
        self.metadata = metadata;
        if self.metadata.module_file.is_none() {
            self.metadata.module_file = path.file_name().map(|n| n.to_string_lossy().into_owned());
        }
        self.performance.set_events(events);
        self.module_path = Some(path.to_path_buf());

        if self.files.is_empty() || Some(self.files.dir()) != path.parent() {
            self.files = FileList::scan(path);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Event loop
    // ─────────────────────────────────────────────────────────────

    /// Drain playback events and run the row-driven logic
    ///
    /// For every row change, recorded performance events of that row are
    /// dispatched, the performance advances and the running phrase steps.
    /// All drained events are returned for display and MIDI output.
    pub fn poll(&mut self) -> Vec<PlaybackEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.pop() {
            drained.push(event);
        }
        for event in &drained {
            if matches!(event, PlaybackEvent::RowChanged { .. }) {
                self.on_row();
            }
        }
        drained
    }

    fn on_row(&mut self) {
        if self.performance.is_playing() {
            for event in self.performance.events_at_current_row() {
                self.dispatch(event, DispatchContext::FromPerformance);
            }
        }
        self.performance.tick();

        if self.phrases.is_active() {
            let tick = self.phrases.on_row(&self.metadata.phrases);
            for event in tick.fired {
                self.dispatch(event, DispatchContext::FromPhrase);
            }
            if tick.completed {
                self.finish_phrase();
            }
        }
    }

    /// A phrase ran out: stop and return to a clean start
    ///
    /// The ending is dispatched as ordinary actions so a recording running
    /// at the time captures it and replays to the same state.
    fn finish_phrase(&mut self) {
        log::debug!("Phrase finished");
        let ctx = DispatchContext::FromPhrase;
        self.dispatch(ActionEvent::new(Action::Stop, 0, 127), ctx);
        self.dispatch(ActionEvent::new(Action::JumpToOrder, 0, 127), ctx);
        self.dispatch(ActionEvent::new(Action::UnmuteAll, 0, 127), ctx);
        let atomics = self.handle.atomics().clone();
        for channel in 0..atomics.num_channels() {
            if atomics.channel_volume(channel) != 1.0 {
                let channel = channel as i32;
                self.dispatch(ActionEvent::new(Action::ChannelVolume, channel, 127), ctx);
            }
        }
        self.handle.reset_channels();
        self.effects.request_reset();
    }

    // ─────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────

    pub fn start_learn(&mut self, target: LearnTarget) {
        self.learn.start(target);
    }

    pub fn cancel_learn(&mut self) {
        self.learn.cancel();
    }

    /// Keyboard input: learn, or look up and dispatch
    pub fn handle_key(&mut self, key: KeyCode) {
        if self.learn.is_active() && !key.is_bindable() {
            log::warn!("Learn: key {:?} cannot be stored in the config, still waiting", key);
            return;
        }
        if let Some(target) = self.learn.take() {
            let (action, parameter) = learn_binding(target);
            let bound = self.config.keyboard.toggle(key, action, parameter);
            log::info!(
                "Learn: {} {} -> {} {}",
                key.config_key(),
                if bound { "bound" } else { "unbound" },
                action,
                parameter
            );
            self.persist_config();
            return;
        }
        if let Some(event) = self.config.keyboard.lookup(key) {
            self.dispatch(event, DispatchContext::User);
        }
    }

    /// MIDI input: note-ons fire pads, CCs go through the mapping table
    pub fn handle_midi(&mut self, event: MidiEvent) {
        match event.message() {
            MidiMessage::NoteOn { note, velocity } => {
                if let Some(LearnTarget::Pad(index)) = self.learn.target() {
                    self.learn.take();
                    self.learn_pad_note(index, note, event.device);
                    return;
                }
                let found = find_pad_for_note(&self.config.pads, &self.metadata.pads, note, event.device);
                if let Some(pad) = found {
                    let trigger = ActionEvent::new(Action::TriggerPad, pad.index() as i32, velocity);
                    self.dispatch(trigger, DispatchContext::User);
                }
            }
            MidiMessage::ControlChange { cc, value } => {
                if let Some(target) = self.learn.take() {
                    let (action, parameter) = learn_binding(target);
                    let mapping = MidiMapping::new(cc, action, parameter)
                        .with_device(DeviceFilter::Port(event.device));
                    let bound = self.config.midi.toggle(mapping);
                    log::info!(
                        "Learn: cc{} {} -> {} {}",
                        cc,
                        if bound { "bound" } else { "unbound" },
                        action,
                        parameter
                    );
                    self.persist_config();
                    return;
                }
                if let Some(action) = self.config.midi.map_cc(cc, value, event.device) {
                    self.dispatch(action, DispatchContext::User);
                }
            }
            MidiMessage::NoteOff { .. } | MidiMessage::Other => {}
        }
    }

    fn learn_pad_note(&mut self, index: usize, note: u8, device: u8) {
        let filter = DeviceFilter::Port(device);
        match PadRef::from_index(index) {
            Some(PadRef::App(i)) => {
                let bound = self.config.pads[i].toggle_note(note, filter);
                log::info!("Learn: pad A{} note {} {}", i + 1, note, if bound { "bound" } else { "unbound" });
                self.persist_config();
            }
            Some(PadRef::Song(i)) => {
                let bound = self.metadata.pads[i].toggle_note(note, filter);
                log::info!("Learn: pad S{} note {} {}", i + 1, note, if bound { "bound" } else { "unbound" });
                self.persist_song();
            }
            None => log::debug!("Learn: pad {} out of range", index),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────

    /// Write the global configuration (no-op without a config path)
    pub fn save_config(&self) -> Result<(), SessionError> {
        match &self.config_path {
            Some(path) => Ok(save_config(&self.config, path)?),
            None => Ok(()),
        }
    }

    /// Write the song's `.rgx` file (no-op without a loaded module)
    ///
    /// A song file that failed to parse at load time is first renamed to
    /// `<name>.rgx.bak` so the write does not destroy it.
    pub fn save_song(&mut self) -> Result<(), SessionError> {
        let Some(module) = &self.module_path else {
            return Ok(());
        };
        let path = song_file_path(module);
        if self.song_file_unreadable {
            let backup = song_backup_path(&path);
            std::fs::rename(&path, &backup).map_err(|source| PersistError::Io {
                path: backup.clone(),
                source,
            })?;
            log::warn!("Moved unreadable song file to {:?}", backup);
            self.song_file_unreadable = false;
        }
        save_song_file(&path, &self.metadata, self.performance.events())?;
        Ok(())
    }

    fn persist_config(&self) {
        if let Err(e) = self.save_config() {
            log::warn!("Failed to save config: {}", e);
        }
    }

    fn persist_song(&mut self) {
        if let Err(e) = self.save_song() {
            log::warn!("Failed to save song metadata: {}", e);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Editing (each edit saves immediately)
    // ─────────────────────────────────────────────────────────────

    pub fn set_pattern_description(&mut self, pattern: usize, text: &str) -> Result<(), SessionError> {
        self.metadata.set_description(pattern, text);
        self.save_song()
    }

    /// Replace a pad (0..15 application, 16..31 song)
    pub fn set_pad(&mut self, index: usize, pad: TriggerPad) -> Result<(), SessionError> {
        match PadRef::from_index(index) {
            Some(PadRef::App(i)) => {
                self.config.pads[i] = pad;
                self.save_config()
            }
            Some(PadRef::Song(i)) => {
                self.metadata.pads[i] = pad;
                self.save_song()
            }
            None => Ok(()),
        }
    }

    pub fn add_phrase(&mut self, phrase: Phrase) -> Result<Option<usize>, SessionError> {
        let index = self.metadata.phrases.add(phrase);
        self.save_song()?;
        Ok(index)
    }

    pub fn remove_phrase(&mut self, index: usize) -> Result<(), SessionError> {
        if self.metadata.phrases.remove(index).is_none() {
            return Ok(());
        }
        // Indices shift; a running phrase can no longer be identified
        self.phrases.cancel();
        self.save_song()
    }

    pub fn add_phrase_step(&mut self, phrase: usize, step: PhraseStep) -> Result<bool, SessionError> {
        let added = self
            .metadata
            .phrases
            .get_mut(phrase)
            .is_some_and(|p| p.add_step(step));
        if added {
            self.save_song()?;
        }
        Ok(added)
    }

    pub fn remove_phrase_step(&mut self, phrase: usize, step: usize) -> Result<(), SessionError> {
        let removed = self
            .metadata
            .phrases
            .get_mut(phrase)
            .and_then(|p| p.remove_step(step));
        if removed.is_some() {
            self.save_song()?;
        }
        Ok(())
    }

    /// Add an event to the performance (only while not recording)
    pub fn insert_performance_event(&mut self, event: PerformanceEvent) -> Result<bool, SessionError> {
        let inserted = self.performance.insert_event(event);
        if inserted {
            self.save_song()?;
        }
        Ok(inserted)
    }

    pub fn remove_performance_event(&mut self, index: usize) -> Result<(), SessionError> {
        if self.performance.remove_event(index).is_some() {
            self.save_song()?;
        }
        Ok(())
    }

    pub fn clear_performance(&mut self) -> Result<(), SessionError> {
        if self.performance.is_recording() {
            return Ok(());
        }
        self.performance.clear();
        self.save_song()
    }
}

/// Action and parameter a learned input binds to
fn learn_binding(target: LearnTarget) -> (Action, i32) {
    match target {
        LearnTarget::Action { action, parameter } => (action, parameter),
        LearnTarget::Pad(index) => (Action::TriggerPad, index as i32),
    }
}

fn song_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}
