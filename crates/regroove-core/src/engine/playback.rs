//! Playback engine - drives the renderer and runs the loop state machine
//!
//! The engine lives on the audio thread. Each buffer it:
//!
//! 1. Applies queued [`Command`]s (channel mirror, jumps, loop targets)
//! 2. Services a song-mode queued jump
//! 3. Renders the buffer at `device_rate / pitch`
//! 4. Reads the renderer position and runs the pattern-wrap state machine
//! 5. Reports order/row/loop changes as [`PlaybackEvent`]s
//! 6. Publishes its state to [`EngineAtomics`]
//!
//! # Loop precedence
//!
//! A one-shot `loop_till_row` takes precedence over pattern mode, which in
//! turn takes precedence over song-mode navigation. In pattern mode the
//! engine never leaves the loop order: any other order observed after a
//! render snaps back to row 0 of the loop order.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{first_order_of_pattern, Command, EngineAtomics, MixerState, ModuleRenderer, NoteEvent};
use crate::types::Position;

/// Lowest accepted pitch factor
pub const MIN_PITCH: f64 = 0.01;

/// Highest accepted pitch factor
pub const MAX_PITCH: f64 = 4.0;

/// Capacity of the audio → UI event ringbuffer
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Loop step that selects the full pattern
pub const FULL_LOOP_STEP: u8 = 15;

/// Notifications from the audio thread, drained by the UI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Playback entered a different order
    OrderChanged { order: usize, pattern: usize },
    /// Playback entered a different row
    RowChanged { order: usize, pattern: usize, row: usize },
    /// The loop pattern wrapped (pattern mode or loop-till)
    PatternLooped { order: usize },
    /// The song wrapped from the last order back to the first
    SongLooped,
    /// A note was triggered by the renderer
    Note(NoteEvent),
}

/// Create the audio → UI event channel
pub fn event_channel() -> (rtrb::Producer<PlaybackEvent>, rtrb::Consumer<PlaybackEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}

/// Clamp a pitch factor into the accepted range
///
/// Returns `None` for non-finite input.
pub fn clamp_pitch(pitch: f64) -> Option<f64> {
    pitch.is_finite().then(|| pitch.clamp(MIN_PITCH, MAX_PITCH))
}

/// Rows looped for a loop step (0..=15) of a pattern with `full_rows` rows
///
/// Step 15 selects the full pattern (returned as 0); lower steps select
/// `(step + 1) * full_rows / 16` rows, floored at one.
pub fn loop_step_rows(step: u8, full_rows: usize) -> usize {
    if step >= FULL_LOOP_STEP {
        0
    } else {
        ((step as usize + 1) * full_rows / 16).max(1)
    }
}

pub struct PlaybackEngine {
    renderer: Option<Box<dyn ModuleRenderer>>,
    sample_rate: u32,
    playing: bool,
    mixer: MixerState,
    pitch: f64,

    // Loop state
    pattern_mode: bool,
    loop_order: usize,
    loop_pattern: usize,
    full_loop_rows: usize,
    custom_loop_rows: usize,
    queued_order: Option<usize>,
    loop_till_row: Option<usize>,
    pending_pattern_mode_order: Option<usize>,

    // Change detection
    prev_row: Option<usize>,
    last_msg_order: Option<usize>,
    last_msg_row: Option<usize>,
    last_playback_order: Option<usize>,
    position: Position,

    events: rtrb::Producer<PlaybackEvent>,
    atomics: Arc<EngineAtomics>,
}

impl PlaybackEngine {
    pub fn new(
        sample_rate: u32,
        events: rtrb::Producer<PlaybackEvent>,
        atomics: Arc<EngineAtomics>,
    ) -> Self {
        Self {
            renderer: None,
            sample_rate,
            playing: false,
            mixer: MixerState::default(),
            pitch: 1.0,
            pattern_mode: false,
            loop_order: 0,
            loop_pattern: 0,
            full_loop_rows: 0,
            custom_loop_rows: 0,
            queued_order: None,
            loop_till_row: None,
            pending_pattern_mode_order: None,
            prev_row: None,
            last_msg_order: None,
            last_msg_row: None,
            last_playback_order: None,
            position: Position::default(),
            events,
            atomics,
        }
    }

    /// Install a renderer, resetting all playback state
    ///
    /// Returns the previous renderer so the caller can drop it outside the
    /// audio lock.
    pub fn load(&mut self, renderer: Box<dyn ModuleRenderer>) -> Option<Box<dyn ModuleRenderer>> {
        let old = self.renderer.replace(renderer);
        self.reset_state();
        if let Some(r) = self.renderer.as_deref_mut() {
            self.mixer.reset(r.num_channels());
            self.mixer.apply(r);
            self.position = r.position();
        }
        self.publish();
        old
    }

    /// Remove the renderer; the engine renders silence until the next load
    pub fn unload(&mut self) -> Option<Box<dyn ModuleRenderer>> {
        let old = self.renderer.take();
        self.reset_state();
        self.mixer.reset(0);
        self.publish();
        old
    }

    fn reset_state(&mut self) {
        self.playing = false;
        self.pitch = 1.0;
        self.pattern_mode = false;
        self.loop_order = 0;
        self.loop_pattern = 0;
        self.full_loop_rows = 0;
        self.custom_loop_rows = 0;
        self.queued_order = None;
        self.loop_till_row = None;
        self.pending_pattern_mode_order = None;
        self.prev_row = None;
        self.last_msg_order = None;
        self.last_msg_row = None;
        self.last_playback_order = None;
        self.position = Position::default();
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn renderer(&self) -> Option<&dyn ModuleRenderer> {
        self.renderer.as_deref()
    }

    pub fn mixer(&self) -> &MixerState {
        &self.mixer
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Last reported position
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_pattern_mode(&self) -> bool {
        self.pattern_mode
    }

    pub fn loop_order(&self) -> usize {
        self.loop_order
    }

    pub fn custom_loop_rows(&self) -> usize {
        self.custom_loop_rows
    }

    pub fn full_loop_rows(&self) -> usize {
        self.full_loop_rows
    }

    pub fn pending_pattern_mode_order(&self) -> Option<usize> {
        self.pending_pattern_mode_order
    }

    pub fn queued_order(&self) -> Option<usize> {
        self.queued_order
    }

    pub fn is_looping_till(&self) -> bool {
        self.loop_till_row.is_some()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Adopt the device rate negotiated by the audio backend
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
    }

    /// Rate handed to the renderer so that `pitch > 1` plays faster
    pub fn render_rate(&self) -> u32 {
        (self.sample_rate as f64 / self.pitch).round().clamp(1.0, u32::MAX as f64) as u32
    }

    // ─────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────

    /// Apply all pending commands in enqueue order (audio thread)
    pub fn process_commands(&mut self, commands: &mut rtrb::Consumer<Command>) {
        while let Ok(command) = commands.pop() {
            self.apply(command);
        }
    }

    /// Apply a single command
    ///
    /// Without a module only transport state can change.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SetPitch(pitch) => {
                if let Some(pitch) = clamp_pitch(pitch) {
                    self.pitch = pitch;
                }
                return;
            }
            Command::SetPlaying(playing) => {
                self.playing = playing;
                return;
            }
            _ => {}
        }

        let Some(num_orders) = self.renderer().map(|r| r.num_orders()) else {
            return;
        };
        if num_orders == 0 {
            return;
        }

        match command {
            Command::QueueOrder(order) => self.queue_order(order, num_orders),
            Command::QueuePattern(pattern) => {
                if let Some(order) = self.order_of_pattern(pattern) {
                    self.queue_order(order, num_orders);
                }
            }
            Command::QueueNextOrder => {
                let base = self.queue_base();
                self.queue_order((base + 1) % num_orders, num_orders);
            }
            Command::QueuePrevOrder => {
                let base = self.queue_base();
                self.queue_order((base + num_orders - 1) % num_orders, num_orders);
            }
            Command::JumpToOrder(order) => self.jump_to_order(order, num_orders),
            Command::JumpToPattern(pattern) => {
                if let Some(order) = self.order_of_pattern(pattern) {
                    self.jump_to_order(order, num_orders);
                }
            }
            Command::LoopTillRow(row) => self.start_loop_till(row),
            Command::SetPatternMode(enabled) => self.set_pattern_mode(enabled),
            Command::RetriggerPattern => {
                let order = if self.pattern_mode {
                    self.loop_order
                } else {
                    self.renderer_position().order
                };
                self.seek(order, 0);
                self.prev_row = None;
            }
            Command::SetCustomLoopRows(rows) => self.set_custom_loop_rows(rows),
            Command::HalveLoop => {
                let current = match self.custom_loop_rows {
                    0 => self.loop_pattern_rows(),
                    rows => rows,
                };
                self.set_custom_loop_rows((current / 2).max(1));
            }
            Command::SetLoopStep(step) => {
                let rows = loop_step_rows(step, self.loop_pattern_rows());
                self.set_custom_loop_rows(rows);
            }
            Command::ToggleChannelMute(channel) => {
                if self.mixer.toggle_mute(channel) {
                    self.apply_mixer();
                }
            }
            Command::ToggleChannelSolo(channel) => {
                if self.mixer.toggle_solo(channel) {
                    self.apply_mixer();
                }
            }
            Command::MuteAll => {
                self.mixer.mute_all();
                self.apply_mixer();
            }
            Command::UnmuteAll => {
                self.mixer.unmute_all();
                self.apply_mixer();
            }
            Command::SetChannelVolume { channel, volume } => {
                if self.mixer.set_volume(channel, volume) {
                    if let Some(r) = self.renderer.as_deref_mut() {
                        self.mixer.apply_channel(r, channel);
                    }
                }
            }
            Command::ResetChannels => {
                let channels = self.mixer.len();
                self.mixer.reset(channels);
                self.apply_mixer();
            }
            Command::SetPitch(_) | Command::SetPlaying(_) => {}
        }
    }

    fn queue_order(&mut self, order: usize, num_orders: usize) {
        if order >= num_orders {
            log::debug!("Ignoring queue to order {} ({} orders)", order, num_orders);
            return;
        }
        if self.pattern_mode {
            self.pending_pattern_mode_order = Some(order);
        } else {
            self.queued_order = Some(order);
        }
    }

    /// Order that next/prev navigation is relative to
    fn queue_base(&self) -> usize {
        if self.pattern_mode {
            self.pending_pattern_mode_order.unwrap_or(self.loop_order)
        } else {
            self.queued_order.unwrap_or(self.position.order)
        }
    }

    fn jump_to_order(&mut self, order: usize, num_orders: usize) {
        if order >= num_orders {
            log::debug!("Ignoring jump to order {} ({} orders)", order, num_orders);
            return;
        }
        self.seek(order, 0);
        self.queued_order = None;
        self.loop_till_row = None;
        self.prev_row = None;
        // A jump always re-enters a row, even the one already reported
        self.last_msg_row = None;
        if self.pattern_mode {
            self.capture_loop(order);
            self.pending_pattern_mode_order = None;
        }
    }

    fn start_loop_till(&mut self, row: usize) {
        let pos = self.renderer_position();
        let rows = self.renderer().map_or(0, |r| r.pattern_rows(pos.pattern));
        if row >= rows {
            return;
        }
        self.capture_loop(pos.order);
        self.loop_till_row = Some(row);
        self.prev_row = Some(pos.row);
    }

    fn set_pattern_mode(&mut self, enabled: bool) {
        if enabled {
            if self.pattern_mode {
                return;
            }
            let pos = self.renderer_position();
            self.capture_loop(pos.order);
            self.prev_row = Some(pos.row);
            // A song-mode jump still waiting becomes the next loop target
            self.pending_pattern_mode_order = self.queued_order.take();
            self.pattern_mode = true;
        } else {
            self.pattern_mode = false;
            self.pending_pattern_mode_order = None;
            self.prev_row = None;
        }
    }

    fn set_custom_loop_rows(&mut self, rows: usize) {
        let full = self.loop_pattern_rows();
        self.custom_loop_rows = if rows == 0 || rows >= full { 0 } else { rows };
    }

    /// Rows of the pattern the loop applies to
    fn loop_pattern_rows(&self) -> usize {
        if self.pattern_mode {
            self.full_loop_rows
        } else {
            let pattern = self.renderer_position().pattern;
            self.renderer().map_or(0, |r| r.pattern_rows(pattern))
        }
    }

    /// Make `order` the loop target
    fn capture_loop(&mut self, order: usize) {
        let Some(r) = self.renderer() else {
            return;
        };
        let pattern = r.pattern_at_order(order).unwrap_or(0);
        let rows = r.pattern_rows(pattern);
        self.loop_order = order;
        self.loop_pattern = pattern;
        self.full_loop_rows = rows;
        if self.custom_loop_rows >= rows {
            self.custom_loop_rows = 0;
        }
    }

    fn order_of_pattern(&self, pattern: usize) -> Option<usize> {
        let order = self.renderer().and_then(|r| first_order_of_pattern(r, pattern));
        if order.is_none() {
            log::debug!("Pattern {} is not in the order list", pattern);
        }
        order
    }

    fn renderer_position(&self) -> Position {
        self.renderer().map(|r| r.position()).unwrap_or_default()
    }

    /// Move the renderer and reapply the channel mirror
    fn seek(&mut self, order: usize, row: usize) {
        if let Some(r) = self.renderer.as_deref_mut() {
            r.set_position(order, row);
            self.mixer.apply(r);
        }
    }

    fn apply_mixer(&mut self) {
        if let Some(r) = self.renderer.as_deref_mut() {
            self.mixer.apply(r);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────

    /// Render one buffer of interleaved stereo into `out` (audio thread)
    ///
    /// Emits silence when no module is loaded or playback is stopped.
    /// Returns the number of frames the renderer produced.
    pub fn render(&mut self, out: &mut [i16]) -> usize {
        if self.renderer.is_none() || !self.playing {
            out.fill(0);
            self.publish();
            return 0;
        }

        if !self.pattern_mode {
            if let Some(order) = self.queued_order.take() {
                self.seek(order, 0);
                self.prev_row = None;
            }
        }

        let rate = self.render_rate();
        let frames = match self.renderer.as_deref_mut() {
            Some(r) => r.render(rate, out),
            None => 0,
        };
        let written = (frames * 2).min(out.len());
        out[written..].fill(0);

        let observed = self.renderer_position();
        let position = self.advance_loop_state(observed);
        self.report(position);
        self.forward_notes();
        self.publish();
        frames
    }

    /// Run the pattern-wrap state machine; returns the position to report
    ///
    /// A buffer can span several rows, so a wrap inside the loop order shows
    /// up as the row moving backwards rather than as `last -> 0`.
    fn advance_loop_state(&mut self, pos: Position) -> Position {
        let row = pos.row;
        let went_back = self.prev_row.is_some_and(|prev| row < prev);

        if let Some(target) = self.loop_till_row {
            let crossed = match self.prev_row {
                Some(prev) => prev < target && row >= target,
                None => row >= target,
            };
            if crossed && pos.order == self.loop_order {
                self.loop_till_row = None;
                self.prev_row = None;
                return pos;
            }
            if went_back || pos.order != self.loop_order {
                return self.snap_to_loop();
            }
            self.prev_row = Some(row);
            return pos;
        }

        if self.pattern_mode {
            let loop_rows = match self.custom_loop_rows {
                0 => self.full_loop_rows,
                rows => rows,
            };
            let at_boundary = went_back || (self.custom_loop_rows > 0 && row >= loop_rows);

            if at_boundary {
                if let Some(next) = self.pending_pattern_mode_order.take() {
                    if next != self.loop_order {
                        self.capture_loop(next);
                    }
                    return self.snap_to_loop();
                }
            }
            if at_boundary || pos.order != self.loop_order {
                return self.snap_to_loop();
            }
            self.prev_row = Some(row);
            return pos;
        }

        self.prev_row = Some(row);
        pos
    }

    /// Return to row 0 of the loop order and announce the loop
    fn snap_to_loop(&mut self) -> Position {
        let order = self.loop_order;
        self.seek(order, 0);
        self.prev_row = None;
        self.emit(PlaybackEvent::PatternLooped { order });
        Position::new(order, self.loop_pattern, 0)
    }

    fn report(&mut self, position: Position) {
        let order_changed = self.last_msg_order != Some(position.order);
        if order_changed {
            self.last_msg_order = Some(position.order);
            self.emit(PlaybackEvent::OrderChanged {
                order: position.order,
                pattern: position.pattern,
            });
        }
        if order_changed || self.last_msg_row != Some(position.row) {
            self.last_msg_row = Some(position.row);
            self.emit(PlaybackEvent::RowChanged {
                order: position.order,
                pattern: position.pattern,
                row: position.row,
            });
        }

        let num_orders = self.renderer().map_or(0, |r| r.num_orders());
        if num_orders > 1
            && self.last_playback_order == Some(num_orders - 1)
            && position.order == 0
        {
            self.emit(PlaybackEvent::SongLooped);
        }
        self.last_playback_order = Some(position.order);
        self.position = position;
    }

    fn forward_notes(&mut self) {
        let events = &mut self.events;
        if let Some(r) = self.renderer.as_deref_mut() {
            r.drain_note_events(&mut |note| {
                let _ = events.push(PlaybackEvent::Note(note));
            });
        }
    }

    #[inline]
    fn emit(&mut self, event: PlaybackEvent) {
        // A UI that stops draining loses events rather than stalling audio
        let _ = self.events.push(event);
    }

    /// Publish engine state for the UI
    fn publish(&self) {
        let a = &self.atomics;
        a.loaded.store(self.renderer.is_some(), Ordering::Relaxed);
        a.playing.store(self.playing, Ordering::Relaxed);
        a.store_position(self.position);
        a.num_orders
            .store(self.renderer().map_or(0, |r| r.num_orders()), Ordering::Relaxed);
        a.pattern_mode.store(self.pattern_mode, Ordering::Relaxed);
        a.loop_order.store(self.loop_order, Ordering::Relaxed);
        a.full_loop_rows.store(self.full_loop_rows, Ordering::Relaxed);
        a.custom_loop_rows.store(self.custom_loop_rows, Ordering::Relaxed);
        EngineAtomics::store_optional_order(&a.pending_order, self.pending_pattern_mode_order);
        EngineAtomics::store_optional_order(&a.queued_order, self.queued_order);
        a.looping_till.store(self.loop_till_row.is_some(), Ordering::Relaxed);
        a.pitch.store(self.pitch.to_bits(), Ordering::Relaxed);
        a.store_mixer(&self.mixer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeProbe, FakeRenderer, FAKE_SAMPLE, FRAMES_PER_ROW};
    use crate::types::{DEFAULT_BUFFER_FRAMES, SAMPLE_RATE};
    use std::sync::Mutex;

    struct Harness {
        engine: PlaybackEngine,
        events: rtrb::Consumer<PlaybackEvent>,
        atomics: Arc<EngineAtomics>,
        probe: Arc<Mutex<FakeProbe>>,
        buffer: Vec<i16>,
    }

    impl Harness {
        fn new(orders: Vec<usize>, rows: usize) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let (tx, rx) = event_channel();
            let atomics = Arc::new(EngineAtomics::new());
            let mut engine = PlaybackEngine::new(SAMPLE_RATE, tx, atomics.clone());
            let renderer = FakeRenderer::new(orders, rows);
            let probe = renderer.probe();
            engine.load(Box::new(renderer));
            engine.apply(Command::SetPlaying(true));
            Self {
                engine,
                events: rx,
                atomics,
                probe,
                buffer: vec![0; DEFAULT_BUFFER_FRAMES * 2],
            }
        }

        /// Grow the buffer so every later step advances `rows` rows
        fn set_rows_per_step(&mut self, rows: usize) {
            self.buffer = vec![0; FRAMES_PER_ROW * rows * 2];
        }

        /// Render one buffer and return the events it produced
        fn step(&mut self) -> Vec<PlaybackEvent> {
            self.engine.render(&mut self.buffer);
            let mut out = Vec::new();
            while let Ok(event) = self.events.pop() {
                out.push(event);
            }
            out
        }

        fn run(&mut self, buffers: usize) -> Vec<PlaybackEvent> {
            (0..buffers).flat_map(|_| self.step()).collect()
        }

        /// Render until the reported row is `row` in song mode
        fn run_to_row(&mut self, row: usize) {
            while self.engine.position().row != row {
                self.step();
            }
        }
    }

    fn loops(events: &[PlaybackEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::PatternLooped { .. }))
            .count()
    }

    #[test]
    fn test_pattern_mode_loop() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.engine.apply(Command::SetPatternMode(true));

        // 200 rows at two buffers per row
        let mut events = Vec::new();
        for _ in 0..400 {
            events.extend(h.step());
            assert_eq!(h.atomics.position().order, 0);
        }
        assert_eq!(loops(&events), 3);

        // Every pass reports exactly 64 row changes
        let mut segments = vec![0usize];
        for event in &events {
            match event {
                PlaybackEvent::PatternLooped { order } => {
                    assert_eq!(*order, 0);
                    segments.push(0);
                }
                PlaybackEvent::RowChanged { order, .. } => {
                    assert_eq!(*order, 0);
                    *segments.last_mut().unwrap() += 1;
                }
                _ => {}
            }
        }
        assert_eq!(&segments[..3], &[64, 64, 64]);
    }

    #[test]
    fn test_custom_loop_rows() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.engine.apply(Command::SetPatternMode(true));
        h.engine.apply(Command::SetCustomLoopRows(16));

        let mut rows = Vec::new();
        let mut looped = 0;
        while looped < 3 {
            for event in h.step() {
                match event {
                    PlaybackEvent::PatternLooped { .. } => looped += 1,
                    PlaybackEvent::RowChanged { row, .. } if looped < 3 => rows.push(row),
                    _ => {}
                }
            }
        }

        let expected: Vec<usize> = (0..3).flat_map(|_| 0..16).collect();
        assert_eq!(rows, expected);
    }

    #[test]
    fn test_custom_loop_rows_zero_is_full_pattern() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.engine.apply(Command::SetPatternMode(true));
        h.engine.apply(Command::SetCustomLoopRows(16));
        h.engine.apply(Command::SetCustomLoopRows(0));
        assert_eq!(h.engine.custom_loop_rows(), 0);

        let events = h.run(127);
        assert_eq!(loops(&events), 0);
        let events = h.run(1);
        assert_eq!(loops(&events), 1);
    }

    #[test]
    fn test_solo_exclusivity_reaches_renderer() {
        let mut h = Harness::new(vec![0], 64);

        h.engine.apply(Command::ToggleChannelSolo(2));
        assert_eq!(h.probe.lock().unwrap().channel_volumes, vec![0.0, 0.0, 1.0, 0.0]);

        h.engine.apply(Command::ToggleChannelSolo(2));
        assert_eq!(h.probe.lock().unwrap().channel_volumes, vec![1.0; 4]);

        h.engine.apply(Command::ToggleChannelSolo(1));
        assert_eq!(h.probe.lock().unwrap().channel_volumes, vec![0.0, 1.0, 0.0, 0.0]);

        h.step();
        assert!(h.atomics.is_channel_soloed(1));
        assert!(h.atomics.is_channel_muted(0));
    }

    #[test]
    fn test_volume_survives_mute_all() {
        let mut h = Harness::new(vec![0], 64);
        h.engine.apply(Command::SetChannelVolume { channel: 3, volume: 0.5 });
        h.engine.apply(Command::MuteAll);
        assert_eq!(h.probe.lock().unwrap().channel_volumes, vec![0.0; 4]);
        h.engine.apply(Command::UnmuteAll);
        assert_eq!(h.probe.lock().unwrap().channel_volumes, vec![1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn test_queued_jump_song_mode_is_immediate() {
        let mut h = Harness::new(vec![0, 1, 2, 3, 4, 5, 6], 64);
        h.run_to_row(30);

        h.engine.apply(Command::QueueOrder(5));
        assert_eq!(h.engine.queued_order(), Some(5));

        let events = h.step();
        assert!(events.contains(&PlaybackEvent::OrderChanged { order: 5, pattern: 5 }));
        assert_eq!(h.engine.queued_order(), None);
        assert_eq!(h.atomics.position().order, 5);
        assert_eq!(h.atomics.queued_order(), None);
    }

    #[test]
    fn test_queued_jump_pattern_mode_waits_for_boundary() {
        let mut h = Harness::new(vec![0, 1, 2, 3, 4, 5, 6], 64);
        h.engine.apply(Command::SetPatternMode(true));
        h.run_to_row(30);

        h.engine.apply(Command::QueueOrder(5));
        assert_eq!(h.engine.pending_pattern_mode_order(), Some(5));

        let mut looped = false;
        while !looped {
            for event in h.step() {
                if let PlaybackEvent::PatternLooped { order } = event {
                    assert_eq!(order, 5);
                    looped = true;
                }
            }
            if !looped {
                assert_eq!(h.atomics.position().order, 0);
            }
        }

        assert_eq!(h.engine.loop_order(), 5);
        assert_eq!(h.engine.pending_pattern_mode_order(), None);
        assert_eq!(h.atomics.position().order, 5);

        // Consumed once: the next boundary stays on order 5
        let events = h.run(128);
        assert_eq!(loops(&events), 1);
        assert_eq!(h.engine.loop_order(), 5);
    }

    #[test]
    fn test_queue_next_and_prev_wrap() {
        let mut h = Harness::new(vec![0, 1, 2], 64);
        h.step();

        h.engine.apply(Command::QueuePrevOrder);
        assert_eq!(h.engine.queued_order(), Some(2));
        h.engine.apply(Command::QueueNextOrder);
        assert_eq!(h.engine.queued_order(), Some(0));
        h.engine.apply(Command::QueueNextOrder);
        assert_eq!(h.engine.queued_order(), Some(1));
    }

    #[test]
    fn test_queue_pattern_uses_first_order() {
        let mut h = Harness::new(vec![3, 1, 2, 1, 0], 64);
        h.engine.apply(Command::QueuePattern(1));
        assert_eq!(h.engine.queued_order(), Some(1));
        h.engine.apply(Command::QueuePattern(9));
        assert_eq!(h.engine.queued_order(), Some(1));
    }

    #[test]
    fn test_invalid_jump_ignored() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.engine.apply(Command::JumpToOrder(2));
        h.engine.apply(Command::JumpToPattern(7));
        h.engine.apply(Command::QueueOrder(99));
        assert!(h.probe.lock().unwrap().seeks.is_empty());
        assert_eq!(h.engine.queued_order(), None);
    }

    #[test]
    fn test_jump_retargets_loop_in_pattern_mode() {
        let mut h = Harness::new(vec![0, 1, 2], 32);
        h.engine.apply(Command::SetPatternMode(true));
        h.engine.apply(Command::QueueOrder(1));
        h.engine.apply(Command::JumpToOrder(2));

        assert_eq!(h.engine.loop_order(), 2);
        assert_eq!(h.engine.pending_pattern_mode_order(), None);
        h.step();
        assert_eq!(h.atomics.position().order, 2);
    }

    #[test]
    fn test_pattern_mode_toggle_twice_is_noop() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.engine.apply(Command::SetPatternMode(true));
        h.engine.apply(Command::SetCustomLoopRows(8));
        h.run(5);

        let before = (h.engine.loop_order(), h.engine.custom_loop_rows(), h.engine.full_loop_rows());
        h.engine.apply(Command::SetPatternMode(false));
        h.engine.apply(Command::SetPatternMode(true));
        let after = (h.engine.loop_order(), h.engine.custom_loop_rows(), h.engine.full_loop_rows());

        assert!(h.engine.is_pattern_mode());
        assert_eq!(before, after);
    }

    #[test]
    fn test_loop_step_and_halve() {
        assert_eq!(loop_step_rows(15, 64), 0);
        assert_eq!(loop_step_rows(3, 64), 16);
        assert_eq!(loop_step_rows(0, 64), 4);
        assert_eq!(loop_step_rows(0, 8), 1);

        let mut h = Harness::new(vec![0], 64);
        h.engine.apply(Command::SetPatternMode(true));
        h.engine.apply(Command::SetLoopStep(7));
        assert_eq!(h.engine.custom_loop_rows(), 32);
        h.engine.apply(Command::HalveLoop);
        assert_eq!(h.engine.custom_loop_rows(), 16);
        for _ in 0..10 {
            h.engine.apply(Command::HalveLoop);
        }
        assert_eq!(h.engine.custom_loop_rows(), 1);
        h.engine.apply(Command::SetLoopStep(15));
        assert_eq!(h.engine.custom_loop_rows(), 0);
    }

    #[test]
    fn test_loop_till_row() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.run_to_row(20);

        h.engine.apply(Command::LoopTillRow(20));
        assert!(h.engine.is_looping_till());

        let mut events = Vec::new();
        let mut reached_order_1 = false;
        for _ in 0..300 {
            events.extend(h.step());
            reached_order_1 |= h.atomics.position().order == 1;
        }

        // One wrap back to order 0, then playback continues into order 1
        assert_eq!(loops(&events), 1);
        assert!(reached_order_1);
        assert!(!h.engine.is_looping_till());
    }

    #[test]
    fn test_loop_till_row_invalid_row_ignored() {
        let mut h = Harness::new(vec![0], 16);
        h.engine.apply(Command::LoopTillRow(16));
        assert!(!h.engine.is_looping_till());
    }

    #[test]
    fn test_loop_till_row_single_order_multi_row_buffers() {
        let mut h = Harness::new(vec![0], 64);
        h.run_to_row(20);
        h.engine.apply(Command::LoopTillRow(20));
        h.set_rows_per_step(7);

        // 27, 34 .. 62, then 69 lands on row 5 of the same order
        let events = h.run(6);
        assert_eq!(loops(&events), 0);
        assert_eq!(h.engine.position().row, 62);

        let events = h.run(1);
        assert_eq!(loops(&events), 1);
        assert_eq!(h.engine.position(), Position::new(0, 0, 0));
        assert!(h.engine.is_looping_till());

        // 7, 14, then 21 jumps over the target row
        h.run(2);
        assert!(h.engine.is_looping_till());
        let events = h.run(1);
        assert_eq!(loops(&events), 0);
        assert_eq!(h.engine.position().row, 21);
        assert!(!h.engine.is_looping_till());
    }

    #[test]
    fn test_loop_till_row_overshoot_exits() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.run_to_row(20);
        h.engine.apply(Command::LoopTillRow(20));
        h.set_rows_per_step(7);

        let mut events = Vec::new();
        let mut reached_order_1 = false;
        for _ in 0..20 {
            events.extend(h.step());
            reached_order_1 |= h.atomics.position().order == 1;
        }
        assert_eq!(loops(&events), 1);
        assert!(reached_order_1);
        assert!(!h.engine.is_looping_till());
    }

    #[test]
    fn test_pattern_mode_single_order_multi_row_buffers() {
        let mut h = Harness::new(vec![0], 64);
        h.engine.apply(Command::SetPatternMode(true));
        h.set_rows_per_step(7);

        // Nine steps reach row 63, the tenth wraps within order 0
        let events = h.run(30);
        assert_eq!(loops(&events), 3);
        assert!(h.engine.position().row < 64);
    }

    #[test]
    fn test_retrigger_restarts_current_order() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.run_to_row(10);
        h.engine.apply(Command::RetriggerPattern);
        assert_eq!(h.probe.lock().unwrap().seeks.last(), Some(&(0, 0)));
    }

    #[test]
    fn test_song_loop_event() {
        let mut h = Harness::new(vec![0, 1], 4);
        // Two orders of four rows at two buffers per row
        let events = h.run(16);
        assert_eq!(
            events.iter().filter(|e| **e == PlaybackEvent::SongLooped).count(),
            1
        );
    }

    #[test]
    fn test_pitch_clamped_and_scales_render_rate() {
        let mut h = Harness::new(vec![0], 64);

        h.engine.apply(Command::SetPitch(10.0));
        assert_eq!(h.engine.pitch(), MAX_PITCH);
        h.step();
        assert_eq!(h.probe.lock().unwrap().last_rate, SAMPLE_RATE / 4);

        h.engine.apply(Command::SetPitch(0.0));
        assert_eq!(h.engine.pitch(), MIN_PITCH);

        h.engine.apply(Command::SetPitch(f64::NAN));
        assert_eq!(h.engine.pitch(), MIN_PITCH);
        h.step();
        assert_eq!(h.atomics.pitch(), MIN_PITCH);
    }

    #[test]
    fn test_stopped_renders_silence() {
        let mut h = Harness::new(vec![0], 64);
        h.engine.apply(Command::SetPlaying(false));
        h.buffer.fill(7);
        h.step();
        assert!(h.buffer.iter().all(|&s| s == 0));
        assert_eq!(h.probe.lock().unwrap().frames_rendered, 0);

        h.engine.apply(Command::SetPlaying(true));
        h.step();
        assert!(h.buffer.iter().all(|&s| s == FAKE_SAMPLE));
    }

    #[test]
    fn test_no_renderer_renders_silence() {
        let (tx, _rx) = event_channel();
        let mut engine = PlaybackEngine::new(SAMPLE_RATE, tx, Arc::new(EngineAtomics::new()));
        engine.apply(Command::SetPlaying(true));
        engine.apply(Command::MuteAll);
        let mut buffer = vec![5i16; 64];
        assert_eq!(engine.render(&mut buffer), 0);
        assert!(buffer.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_load_resets_state() {
        let mut h = Harness::new(vec![0, 1], 64);
        h.engine.apply(Command::SetPitch(2.0));
        h.engine.apply(Command::SetPatternMode(true));
        h.engine.apply(Command::ToggleChannelMute(1));
        h.run(10);

        let old = h.engine.load(Box::new(FakeRenderer::new(vec![0, 1, 2], 32)));
        assert!(old.is_some());
        assert_eq!(h.engine.pitch(), 1.0);
        assert!(!h.engine.is_pattern_mode());
        assert!(!h.engine.is_playing());
        assert!(h.engine.mixer().channels().iter().all(|c| !c.muted));
        assert_eq!(h.atomics.num_orders(), 3);
    }
}
