//! End-to-end session tests driven through the fake renderer
//!
//! The fake advances one row per two 256-frame buffers, so `run_rows(n)`
//! is exact in rows.

use super::*;
use crate::engine::testing::FakeLoader;
use crate::types::{DEFAULT_BUFFER_FRAMES, SAMPLE_RATE};

struct Rig {
    session: Session,
    module: PathBuf,
    config_path: PathBuf,
    buffer: Vec<i16>,
    _dir: tempfile::TempDir,
}

impl Rig {
    fn new(orders: Vec<usize>, rows: usize) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("song.mod");
        let config_path = dir.path().join("regroove.ini");
        let loader = FakeLoader::new().with_module(&module, orders, rows);
        let mut session = Session::new(SAMPLE_RATE, Box::new(loader), GlobalConfig::default())
            .with_config_path(&config_path);
        session.load_module(&module).unwrap();
        Self {
            session,
            module,
            config_path,
            buffer: vec![0; DEFAULT_BUFFER_FRAMES * 2],
            _dir: dir,
        }
    }

    /// Render one buffer, then let the session handle the events
    fn step(&mut self) -> Vec<PlaybackEvent> {
        self.session
            .processor()
            .lock()
            .unwrap()
            .process(&mut self.buffer);
        self.session.poll()
    }

    /// Step until `rows` row changes have been handled
    fn run_rows(&mut self, rows: usize) {
        let mut seen = 0;
        for _ in 0..rows * 4 + 4 {
            if seen == rows {
                return;
            }
            seen += self
                .step()
                .iter()
                .filter(|e| matches!(e, PlaybackEvent::RowChanged { .. }))
                .count();
        }
        assert_eq!(seen, rows, "playback stalled");
    }

    fn user(&mut self, action: Action, parameter: i32) {
        self.user_value(action, parameter, 127);
    }

    fn user_value(&mut self, action: Action, parameter: i32, value: u8) {
        self.session
            .dispatch(ActionEvent::new(action, parameter, value), DispatchContext::User);
    }

    fn atomics(&self) -> Arc<EngineAtomics> {
        self.session.atomics().clone()
    }

    fn log(&self) -> Vec<(u32, Action)> {
        self.session
            .performance()
            .events()
            .iter()
            .map(|e| (e.row, e.action))
            .collect()
    }
}

#[test]
fn test_record_and_replay() {
    let mut rig = Rig::new(vec![0, 1], 64);
    rig.user(Action::Play, 0);
    rig.run_rows(1);

    rig.user(Action::RecordToggle, 0);
    rig.user(Action::ChannelMute, 2);
    rig.run_rows(8);
    rig.user(Action::ChannelMute, 2);
    rig.run_rows(8);
    rig.user(Action::Stop, 0);
    rig.user(Action::RecordToggle, 0);

    assert_eq!(
        rig.log(),
        vec![(0, Action::ChannelMute), (8, Action::ChannelMute), (16, Action::Stop)]
    );

    // The two mutes cancelled out
    rig.step();
    let atomics = rig.atomics();
    assert!(!atomics.is_channel_muted(2));
    assert!(!atomics.is_playing());

    rig.user(Action::Play, 0);
    assert!(rig.session.performance().is_playing());

    // Row 0 delivers the first mute; it lands with the next buffer
    rig.run_rows(1);
    rig.step();
    assert_eq!(atomics.position().order, 0);
    assert!(atomics.is_channel_muted(2));

    // Rows 1..=7 stay muted; row 8 unmutes
    rig.run_rows(7);
    assert!(atomics.is_channel_muted(2));
    rig.step();
    assert!(!atomics.is_channel_muted(2));

    // Row 16 replays the stop
    rig.run_rows(8);
    rig.step();
    assert!(!atomics.is_playing());
    assert!(!rig.session.performance().is_playing());
    assert_eq!(rig.session.performance().row(), 0);

    // Replay never re-records
    assert_eq!(rig.session.performance().events().len(), 3);
}

#[test]
fn test_phrase_cancellation() {
    let mut rig = Rig::new(vec![0, 1], 64);
    let mut p1 = Phrase::new("P1");
    p1.add_step(PhraseStep::new(Action::Play, 0, 127, 0));
    p1.add_step(PhraseStep::new(Action::Stop, 0, 127, 32));
    let mut p2 = Phrase::new("P2");
    p2.add_step(PhraseStep::new(Action::MuteAll, 0, 127, 0));
    assert_eq!(rig.session.add_phrase(p1).unwrap(), Some(0));
    assert_eq!(rig.session.add_phrase(p2).unwrap(), Some(1));

    rig.user(Action::Play, 0);
    rig.run_rows(1);
    rig.user(Action::RecordToggle, 0);

    rig.user(Action::TriggerPhrase, 0);
    assert_eq!(rig.session.phrase_engine().active_index(), Some(0));
    rig.run_rows(4);

    rig.user(Action::TriggerPhrase, 1);
    assert_eq!(rig.session.phrase_engine().active_index(), Some(1));
    rig.step();
    let atomics = rig.atomics();
    assert!((0..4).all(|ch| atomics.is_channel_muted(ch)));

    // P2 ends one row after its last step: stop, rewind, unmute
    rig.run_rows(1);
    assert!(!rig.session.phrase_engine().is_active());
    rig.step();
    assert!(!atomics.is_playing());
    assert!((0..4).all(|ch| !atomics.is_channel_muted(ch)));
    assert_eq!(atomics.position().order, 0);

    rig.user(Action::RecordToggle, 0);
    assert_eq!(
        rig.log(),
        vec![
            (0, Action::Play),
            (4, Action::MuteAll),
            (5, Action::Stop),
            (5, Action::JumpToOrder),
            (5, Action::UnmuteAll),
        ]
    );
}

#[test]
fn test_recorded_phrase_ending_replays() {
    let mut rig = Rig::new(vec![0, 1], 64);
    let mut p = Phrase::new("drop");
    p.add_step(PhraseStep::new(Action::MuteAll, 0, 127, 0));
    rig.session.add_phrase(p).unwrap();

    rig.user(Action::RecordToggle, 0);
    rig.user(Action::TriggerPhrase, 0);
    rig.run_rows(1);
    assert!(!rig.session.phrase_engine().is_active());
    rig.user(Action::RecordToggle, 0);
    assert_eq!(
        rig.log(),
        vec![
            (0, Action::MuteAll),
            (1, Action::Stop),
            (1, Action::JumpToOrder),
            (1, Action::UnmuteAll),
        ]
    );

    rig.step();
    let atomics = rig.atomics();
    let live = (atomics.is_playing(), atomics.is_channel_muted(0));
    assert_eq!(live, (false, false));

    rig.user(Action::Play, 0);
    rig.run_rows(1);
    rig.step();
    assert!(atomics.is_channel_muted(0));

    for _ in 0..8 {
        if !rig.session.performance().is_playing() {
            break;
        }
        rig.step();
    }
    rig.step();
    let replay = (atomics.is_playing(), atomics.is_channel_muted(0));
    assert_eq!(replay, live);
    assert!(!rig.session.performance().is_playing());
    assert_eq!(atomics.position().order, 0);
}

#[test]
fn test_phrase_ending_restores_channel_volume() {
    let mut rig = Rig::new(vec![0], 64);
    let mut p = Phrase::new("fade");
    p.add_step(PhraseStep::new(Action::ChannelVolume, 1, 0, 0));
    rig.session.add_phrase(p).unwrap();

    rig.user(Action::RecordToggle, 0);
    rig.user(Action::TriggerPhrase, 0);

    // The first row ends the phrase; its volume change is already applied
    rig.step();
    assert_eq!(rig.atomics().channel_volume(1), 0.0);
    assert!(!rig.session.phrase_engine().is_active());

    rig.user(Action::RecordToggle, 0);
    rig.step();
    assert_eq!(rig.atomics().channel_volume(1), 1.0);
    assert!(rig.log().contains(&(1, Action::ChannelVolume)));
}

#[test]
fn test_phrase_auto_starts_playback() {
    let mut rig = Rig::new(vec![0], 64);
    let mut p = Phrase::new("hit");
    p.add_step(PhraseStep::new(Action::ChannelMute, 1, 127, 2));
    rig.session.add_phrase(p).unwrap();

    rig.user(Action::TriggerPhrase, 0);
    assert!(rig.session.is_playing());
    rig.run_rows(2);
    rig.step();
    assert!(rig.atomics().is_channel_muted(1));
}

#[test]
fn test_phrase_trigger_blocked_outside_user_context() {
    let mut rig = Rig::new(vec![0], 64);
    let mut p = Phrase::new("p");
    p.add_step(PhraseStep::new(Action::MuteAll, 0, 127, 0));
    rig.session.add_phrase(p).unwrap();

    let trigger = ActionEvent::new(Action::TriggerPhrase, 0, 127);
    rig.session.dispatch(trigger, DispatchContext::FromPerformance);
    rig.session.dispatch(trigger, DispatchContext::FromPhrase);
    assert!(!rig.session.phrase_engine().is_active());

    rig.session.dispatch(trigger, DispatchContext::User);
    assert!(rig.session.phrase_engine().is_active());
}

#[test]
fn test_play_from_phrase_does_not_start_performance() {
    let mut rig = Rig::new(vec![0], 64);
    rig.session
        .insert_performance_event(PerformanceEvent::new(4, ActionEvent::new(Action::MuteAll, 0, 127)))
        .unwrap();

    rig.session
        .dispatch(ActionEvent::new(Action::Play, 0, 127), DispatchContext::FromPhrase);
    assert!(rig.session.is_playing());
    assert!(!rig.session.performance().is_playing());

    rig.user(Action::Stop, 0);
    rig.user(Action::Play, 0);
    assert!(rig.session.performance().is_playing());
}

#[test]
fn test_play_pause_toggles() {
    let mut rig = Rig::new(vec![0], 64);
    rig.user(Action::PlayPause, 0);
    assert!(rig.session.is_playing());
    rig.user(Action::PlayPause, 0);
    assert!(!rig.session.is_playing());
    rig.step();
    assert!(!rig.atomics().is_playing());
}

#[test]
fn test_midi_note_fires_pads() {
    let mut rig = Rig::new(vec![0], 64);
    rig.session
        .set_pad(0, TriggerPad::new(Action::MuteAll, 0).with_note(36, DeviceFilter::Any))
        .unwrap();
    rig.session
        .set_pad(16, TriggerPad::new(Action::Play, 0).with_note(36, DeviceFilter::Any))
        .unwrap();
    rig.session
        .set_pad(17, TriggerPad::new(Action::ChannelSolo, 1).with_note(37, DeviceFilter::Port(1)))
        .unwrap();

    // Application pad shadows the song pad on the same note
    rig.session.handle_midi(MidiEvent::new(0x90, 36, 100, 0));
    assert!(!rig.session.is_playing());
    rig.step();
    assert!(rig.atomics().is_channel_muted(3));

    // Wrong device, then the right one
    rig.session.handle_midi(MidiEvent::new(0x90, 37, 100, 0));
    rig.step();
    assert!(!rig.atomics().is_channel_soloed(1));
    rig.session.handle_midi(MidiEvent::new(0x90, 37, 100, 1));
    rig.step();
    assert!(rig.atomics().is_channel_soloed(1));

    // Velocity 0 is a note-off
    rig.session.handle_midi(MidiEvent::new(0x90, 37, 0, 1));
    rig.step();
    assert!(rig.atomics().is_channel_soloed(1));
}

#[test]
fn test_pad_records_resolved_action() {
    let mut rig = Rig::new(vec![0], 64);
    rig.session
        .set_pad(3, TriggerPad::new(Action::ChannelMute, 2))
        .unwrap();
    rig.user(Action::RecordToggle, 0);
    rig.user(Action::TriggerPad, 3);
    rig.user(Action::RecordToggle, 0);

    let events = rig.session.performance().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, Action::ChannelMute);
    assert_eq!(events[0].parameter, 2);
}

#[test]
fn test_learn_midi_cc() {
    let mut rig = Rig::new(vec![0], 64);
    let before = rig.session.config().midi.mappings().len();

    rig.session.start_learn(LearnTarget::Action {
        action: Action::ChannelMute,
        parameter: 3,
    });
    rig.session.handle_midi(MidiEvent::new(0xB0, 70, 127, 1));
    assert!(!rig.session.learn().is_active());
    assert_eq!(rig.session.config().midi.mappings().len(), before + 1);

    let saved = std::fs::read_to_string(&rig.config_path).unwrap();
    assert!(saved.contains("cc70 = channel_mute,3,0,1"));

    // The learned binding fires on the next press
    rig.session.handle_midi(MidiEvent::new(0xB0, 70, 127, 1));
    rig.step();
    assert!(rig.atomics().is_channel_muted(3));

    // Learning the same binding again removes it
    rig.session.start_learn(LearnTarget::Action {
        action: Action::ChannelMute,
        parameter: 3,
    });
    rig.session.handle_midi(MidiEvent::new(0xB0, 70, 127, 1));
    assert_eq!(rig.session.config().midi.mappings().len(), before);
}

#[test]
fn test_learn_key() {
    let mut rig = Rig::new(vec![0], 64);
    rig.user(Action::Play, 0);
    rig.session.start_learn(LearnTarget::Action {
        action: Action::Stop,
        parameter: 0,
    });
    rig.session.handle_key(KeyCode::from_char('K'));
    assert!(rig.session.is_playing());

    rig.session.handle_key(KeyCode::Char('k'));
    assert!(!rig.session.is_playing());

    let saved = std::fs::read_to_string(&rig.config_path).unwrap();
    assert!(saved.contains("keyk = stop,0"));
}

#[test]
fn test_learned_tab_survives_reload() {
    let mut rig = Rig::new(vec![0], 64);
    let target = LearnTarget::Action {
        action: Action::Stop,
        parameter: 0,
    };

    // An unnamed control character keeps learn mode waiting
    rig.session.start_learn(target);
    rig.session.handle_key(KeyCode::from_char('\x01'));
    assert!(rig.session.learn().is_active());

    rig.session.handle_key(KeyCode::from_char('\t'));
    assert!(!rig.session.learn().is_active());

    let saved = std::fs::read_to_string(&rig.config_path).unwrap();
    assert!(saved.contains("key_tab = stop,0"));
    let reloaded = GlobalConfig::parse(&saved).unwrap();
    let event = reloaded.keyboard.lookup(KeyCode::Tab).unwrap();
    assert_eq!((event.action, event.parameter), (Action::Stop, 0));
}

#[test]
fn test_learn_song_pad_note_persists() {
    let mut rig = Rig::new(vec![0], 64);
    rig.session
        .set_pad(16, TriggerPad::new(Action::Retrigger, 0))
        .unwrap();
    rig.session.start_learn(LearnTarget::Pad(16));
    rig.session.handle_midi(MidiEvent::new(0x91, 50, 90, 0));
    assert!(!rig.session.learn().is_active());

    let song = load_song_file(&song_file_path(&rig.module)).unwrap().unwrap();
    assert_eq!(song.metadata.pads[0].midi_note, Some(50));
    assert_eq!(song.metadata.pads[0].midi_device, DeviceFilter::Port(0));
}

#[test]
fn test_metadata_survives_reload() {
    let mut rig = Rig::new(vec![0, 1], 64);
    rig.session.set_pattern_description(1, "Chorus").unwrap();
    let mut p = Phrase::new("Fill");
    p.add_step(PhraseStep::new(Action::Retrigger, 0, 127, 0));
    rig.session.add_phrase(p).unwrap();
    rig.session
        .insert_performance_event(PerformanceEvent::new(2, ActionEvent::new(Action::ChannelSolo, 1, 127)))
        .unwrap();

    let module = rig.module.clone();
    rig.session.load_module(&module).unwrap();

    assert_eq!(rig.session.metadata().description(1), Some("Chorus"));
    assert_eq!(rig.session.metadata().phrases.len(), 1);
    assert_eq!(rig.session.performance().events().len(), 1);
    assert_eq!(rig.session.metadata().module_file.as_deref(), Some("song.mod"));
}

#[test]
fn test_unreadable_song_file_is_kept_aside() {
    let mut rig = Rig::new(vec![0, 1], 64);
    let rgx = song_file_path(&rig.module);
    let garbage = "written by hand\nno equals sign here\n";
    std::fs::write(&rgx, garbage).unwrap();

    let module = rig.module.clone();
    rig.session.load_module(&module).unwrap();
    assert_eq!(rig.session.metadata().description(0), None);

    rig.session.set_pattern_description(0, "Intro").unwrap();
    let backup = rgx.with_file_name("song.rgx.bak");
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), garbage);

    // Later saves overwrite the fresh file only
    rig.session.set_pattern_description(1, "Verse").unwrap();
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), garbage);
    let song = load_song_file(&rgx).unwrap().unwrap();
    assert_eq!(song.metadata.description(0), Some("Intro"));
    assert_eq!(song.metadata.description(1), Some("Verse"));
}

#[test]
fn test_failed_load_keeps_module() {
    let mut rig = Rig::new(vec![0, 1], 64);
    let missing = rig.module.with_file_name("missing.xm");
    let result = rig.session.load_module(&missing);

    assert!(matches!(result, Err(SessionError::Load(_))));
    rig.step();
    assert_eq!(rig.session.module_path(), Some(rig.module.as_path()));
    assert!(rig.atomics().is_loaded());
    assert_eq!(rig.atomics().num_orders(), 2);
}

#[test]
fn test_pitch_slider() {
    let mut rig = Rig::new(vec![0], 64);
    rig.user(Action::PitchUp, 0);
    assert!((rig.session.pitch_slider() - 0.02).abs() < 1e-9);

    rig.user_value(Action::PitchSet, 0, 127);
    rig.step();
    assert_eq!(rig.atomics().pitch(), 2.0);

    rig.user_value(Action::PitchSet, 0, 0);
    rig.step();
    assert_eq!(rig.atomics().pitch(), 0.5);

    rig.user(Action::PitchReset, 0);
    rig.step();
    assert_eq!(rig.atomics().pitch(), 1.0);
}

#[test]
fn test_loop_actions_enter_pattern_mode() {
    let mut rig = Rig::new(vec![0, 1], 64);
    rig.user(Action::SetLoopStep, 3);
    assert!(rig.session.is_pattern_mode());
    rig.step();
    let atomics = rig.atomics();
    assert!(atomics.is_pattern_mode());
    assert_eq!(atomics.loop_rows(), 16);

    rig.user(Action::FullLoop, 0);
    rig.step();
    assert_eq!(atomics.loop_rows(), 64);

    rig.user(Action::PatternModeToggle, 0);
    rig.step();
    assert!(!atomics.is_pattern_mode());
}

#[test]
fn test_effect_actions() {
    let mut rig = Rig::new(vec![0], 64);
    let params = rig.session.effect_params().clone();

    rig.user(Action::FxFilterToggle, 0);
    assert!(params.is_enabled(crate::effect::EffectKind::Filter));
    rig.user_value(Action::FxDelayTime, 0, 127);
    assert_eq!(params.get(crate::effect::EffectKind::Delay, 0), 1.0);
    rig.user_value(Action::FxEqLow, 0, 0);
    assert_eq!(params.get(crate::effect::EffectKind::Eq, 0), 0.0);
}

#[test]
fn test_channel_volume_and_quit() {
    let mut rig = Rig::new(vec![0], 64);
    rig.user_value(Action::ChannelVolume, 1, 0);
    rig.user_value(Action::ChannelVolume, 99, 0);
    rig.step();
    assert_eq!(rig.atomics().channel_volume(1), 0.0);
    assert_eq!(rig.atomics().channel_volume(0), 1.0);

    assert!(!rig.session.quit_requested());
    rig.user(Action::Quit, 0);
    assert!(rig.session.quit_requested());
}
