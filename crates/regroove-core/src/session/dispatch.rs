//! Action dispatch
//!
//! Every input path ends here. The [`DispatchContext`] says where an
//! action came from: replayed performance events are never re-recorded,
//! and phrase steps can neither trigger phrases nor start performance
//! playback.

use crate::action::{Action, ActionEvent, DispatchContext, FxTarget};
use crate::pads::PadRef;

use super::Session;

/// Pitch slider step for `pitch_up` / `pitch_down`
pub const PITCH_SLIDER_STEP: f64 = 0.02;

/// Pitch factor for a slider position in [-1, 1]
pub fn pitch_for_slider(position: f64) -> f64 {
    2f64.powf(position.clamp(-1.0, 1.0))
}

impl Session {
    /// Execute an action
    pub fn dispatch(&mut self, event: ActionEvent, ctx: DispatchContext) {
        if self.performance.is_recording()
            && ctx != DispatchContext::FromPerformance
            && event.action.is_recordable()
        {
            self.performance.record_event(event);
        }

        let index = event.index();
        match event.action {
            Action::None => {}

            // Transport
            Action::Play => self.play(ctx),
            Action::Stop => self.stop_playback(),
            Action::PlayPause => {
                if self.playing {
                    self.stop_playback();
                } else {
                    self.play(ctx);
                }
            }
            Action::Retrigger => self.handle.retrigger_pattern(),

            // Orders and patterns
            Action::NextOrder => self.handle.queue_next_order(),
            Action::PrevOrder => self.handle.queue_prev_order(),
            Action::JumpToOrder => {
                if let Some(order) = index {
                    self.handle.jump_to_order(order);
                }
            }
            Action::JumpToPattern => {
                if let Some(pattern) = index {
                    self.handle.jump_to_pattern(pattern);
                }
            }
            Action::QueueOrder => {
                if let Some(order) = index {
                    self.handle.queue_order(order);
                }
            }
            Action::QueuePattern => {
                if let Some(pattern) = index {
                    self.handle.queue_pattern(pattern);
                }
            }

            // Loops
            Action::LoopTillRow => {
                let row = self.handle.atomics().position().row;
                self.handle.loop_till_row(row);
            }
            Action::HalveLoop => {
                self.ensure_pattern_mode();
                self.handle.halve_loop();
            }
            Action::FullLoop => {
                self.ensure_pattern_mode();
                self.handle.set_custom_loop_rows(0);
            }
            Action::SetLoopStep => {
                if let Some(step) = index.and_then(|s| u8::try_from(s).ok()) {
                    self.ensure_pattern_mode();
                    self.handle.set_loop_step(step);
                }
            }
            Action::PatternModeToggle => {
                self.pattern_mode = !self.pattern_mode;
                self.handle.set_pattern_mode(self.pattern_mode);
            }

            // Channels
            Action::ChannelMute => {
                if let Some(channel) = index {
                    self.handle.toggle_channel_mute(channel);
                }
            }
            Action::ChannelSolo => {
                if let Some(channel) = index {
                    self.handle.toggle_channel_solo(channel);
                }
            }
            Action::ChannelVolume => {
                if let Some(channel) = index {
                    self.handle.set_channel_volume(channel, event.normalized());
                }
            }
            Action::MuteAll => self.handle.mute_all(),
            Action::UnmuteAll => self.handle.unmute_all(),

            // Pitch
            Action::PitchUp => self.set_pitch_slider(self.pitch_slider + PITCH_SLIDER_STEP),
            Action::PitchDown => self.set_pitch_slider(self.pitch_slider - PITCH_SLIDER_STEP),
            Action::PitchSet => self.set_pitch_slider(event.normalized() as f64 * 2.0 - 1.0),
            Action::PitchReset => self.set_pitch_slider(0.0),

            // Files
            Action::FilePrev => {
                self.files.prev();
            }
            Action::FileNext => {
                self.files.next();
            }
            Action::FileLoad => self.load_selected(),

            Action::RecordToggle => {
                let recording = !self.performance.is_recording();
                self.performance.set_recording(recording);
                log::info!("Performance: recording {}", if recording { "started" } else { "stopped" });
                if !recording {
                    self.persist_song();
                }
            }

            // Triggers
            Action::TriggerPad => {
                if let Some(pad) = index.and_then(PadRef::from_index) {
                    self.trigger_pad(pad, event.value, ctx);
                }
            }
            Action::TriggerPhrase => {
                if ctx == DispatchContext::User {
                    if let Some(phrase) = index {
                        self.trigger_phrase(phrase);
                    }
                }
            }

            Action::Quit => self.quit_requested = true,

            fx => match fx.fx_target() {
                Some(FxTarget::Param(kind, param)) => self.effects.set(kind, param, event.normalized()),
                Some(FxTarget::Toggle(kind)) => {
                    let enabled = self.effects.toggle(kind);
                    log::debug!("Effect {} {}", kind.name(), if enabled { "on" } else { "off" });
                }
                None => {}
            },
        }
    }

    /// Start playback
    ///
    /// From user input with a recorded performance, playback restarts at
    /// order 0 and the performance replays from its first row.
    fn play(&mut self, ctx: DispatchContext) {
        if ctx == DispatchContext::User
            && !self.performance.is_empty()
            && !self.performance.is_recording()
        {
            self.handle.jump_to_order(0);
            self.performance.set_playback(true);
        }
        self.start_playback();
    }

    pub(super) fn start_playback(&mut self) {
        self.playing = true;
        self.handle.set_playing(true);
    }

    pub(super) fn stop_playback(&mut self) {
        self.playing = false;
        self.handle.set_playing(false);
        if self.performance.is_playing() {
            self.performance.set_playback(false);
        }
    }

    fn ensure_pattern_mode(&mut self) {
        if !self.pattern_mode {
            self.pattern_mode = true;
            self.handle.set_pattern_mode(true);
        }
    }

    fn set_pitch_slider(&mut self, position: f64) {
        self.pitch_slider = position.clamp(-1.0, 1.0);
        self.handle.set_pitch(pitch_for_slider(self.pitch_slider));
    }

    fn trigger_pad(&mut self, pad: PadRef, value: u8, ctx: DispatchContext) {
        let target = match pad {
            PadRef::App(i) => self.config.pads[i],
            PadRef::Song(i) => self.metadata.pads[i],
        };
        match target.action {
            Action::None => {}
            Action::TriggerPad => log::debug!("Pad {} points at another pad, ignored", pad.index()),
            action => self.dispatch(ActionEvent::new(action, target.parameter, value), ctx),
        }
    }

    fn trigger_phrase(&mut self, index: usize) {
        let Some(fired) = self.phrases.trigger(&self.metadata.phrases, index) else {
            log::debug!("Phrase {} missing or empty", index);
            return;
        };
        if !self.playing {
            self.start_playback();
        }
        for event in fired {
            self.dispatch(event, DispatchContext::FromPhrase);
        }
    }

    fn load_selected(&mut self) {
        let Some(path) = self.files.selected().map(|p| p.to_path_buf()) else {
            return;
        };
        let was_playing = self.playing;
        match self.load_module(&path) {
            Ok(()) if was_playing => self.start_playback(),
            Ok(()) => {}
            Err(e) => log::warn!("Failed to load {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_for_slider() {
        assert_eq!(pitch_for_slider(0.0), 1.0);
        assert_eq!(pitch_for_slider(1.0), 2.0);
        assert_eq!(pitch_for_slider(-1.0), 0.5);
        assert_eq!(pitch_for_slider(5.0), 2.0);
    }
}
