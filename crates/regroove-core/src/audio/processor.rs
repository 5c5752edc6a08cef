//! Audio-thread state: command drain, playback engine, effects chain

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::effect::{EffectParams, EffectsChain};
use crate::engine::{Command, EngineAtomics, ModuleRenderer, PlaybackEngine, PlaybackEvent};

/// Processor shared between the session (module swaps) and the audio
/// callback, which only ever `try_lock`s it
pub type SharedProcessor = Arc<Mutex<AudioProcessor>>;

/// Non-blocking lock for the audio callback; `None` while the session
/// holds the processor
///
/// A poisoned lock still yields the processor: a panic elsewhere must not
/// silence playback for the rest of the session.
pub fn try_lock_processor(processor: &SharedProcessor) -> Option<MutexGuard<'_, AudioProcessor>> {
    match processor.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

pub struct AudioProcessor {
    engine: PlaybackEngine,
    effects: EffectsChain,
    commands: rtrb::Consumer<Command>,
}

impl AudioProcessor {
    pub fn new(
        sample_rate: u32,
        commands: rtrb::Consumer<Command>,
        events: rtrb::Producer<PlaybackEvent>,
        atomics: Arc<EngineAtomics>,
        effect_params: Arc<EffectParams>,
    ) -> Self {
        Self {
            engine: PlaybackEngine::new(sample_rate, events, atomics),
            effects: EffectsChain::new(sample_rate, effect_params),
            commands,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine {
        &mut self.engine
    }

    /// Drain commands, render and run effects on one interleaved stereo
    /// buffer (audio thread)
    pub fn process(&mut self, out: &mut [i16]) {
        self.engine.process_commands(&mut self.commands);
        self.engine.render(out);
        self.effects.process(out);
    }

    /// Switch to the device rate; effect state is rebuilt for the new rate
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.engine.sample_rate() {
            return;
        }
        log::info!("Audio: sample rate {} Hz", sample_rate);
        self.engine.set_sample_rate(sample_rate);
        let params = self.effects.params().clone();
        self.effects = EffectsChain::new(sample_rate, params);
    }

    /// Install a module renderer
    ///
    /// Commands still queued for the previous module are discarded. The
    /// old renderer is returned so it can be dropped after the lock is
    /// released.
    pub fn load(&mut self, renderer: Box<dyn ModuleRenderer>) -> Option<Box<dyn ModuleRenderer>> {
        let mut stale = 0usize;
        while self.commands.pop().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            log::debug!("Audio: discarded {} stale commands on load", stale);
        }
        self.effects.reset();
        self.engine.load(renderer)
    }

    pub fn unload(&mut self) -> Option<Box<dyn ModuleRenderer>> {
        self.engine.unload()
    }
}
