//! The closed set of performable actions
//!
//! Action names are an external contract: they appear in the global config
//! (`[midi]`, `[keyboard]`, `[trigger_pads]`), in `.rgx` song pads and
//! phrases. Numeric ids are persisted in the performance log, so new
//! variants must only ever be appended.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::effect::EffectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,

    // Transport
    Play,
    Stop,
    PlayPause,
    Retrigger,

    // Order / pattern
    NextOrder,
    PrevOrder,
    JumpToOrder,
    JumpToPattern,
    QueueOrder,
    QueuePattern,

    // Loop
    LoopTillRow,
    HalveLoop,
    FullLoop,
    SetLoopStep,
    PatternModeToggle,

    // Channels
    ChannelMute,
    ChannelSolo,
    ChannelVolume,
    MuteAll,
    UnmuteAll,

    // Pitch
    PitchUp,
    PitchDown,
    PitchSet,
    PitchReset,

    // File
    FilePrev,
    FileNext,
    FileLoad,

    // Performance and triggers
    RecordToggle,
    TriggerPad,
    TriggerPhrase,

    // Effects
    FxOverdriveDrive,
    FxOverdriveMix,
    FxOverdriveToggle,
    FxFilterCutoff,
    FxFilterResonance,
    FxFilterToggle,
    FxEqLow,
    FxEqMid,
    FxEqHigh,
    FxEqToggle,
    FxCompressorThreshold,
    FxCompressorRatio,
    FxCompressorAttack,
    FxCompressorRelease,
    FxCompressorMakeup,
    FxCompressorToggle,
    FxDelayTime,
    FxDelayFeedback,
    FxDelayMix,
    FxDelayToggle,

    Quit,
}

/// What an effect action controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxTarget {
    /// A normalized parameter of a unit
    Param(EffectKind, usize),
    /// A unit's enable flag
    Toggle(EffectKind),
}

impl Action {
    /// Every action, in id order
    pub const ALL: [Action; 52] = [
        Action::None,
        Action::Play,
        Action::Stop,
        Action::PlayPause,
        Action::Retrigger,
        Action::NextOrder,
        Action::PrevOrder,
        Action::JumpToOrder,
        Action::JumpToPattern,
        Action::QueueOrder,
        Action::QueuePattern,
        Action::LoopTillRow,
        Action::HalveLoop,
        Action::FullLoop,
        Action::SetLoopStep,
        Action::PatternModeToggle,
        Action::ChannelMute,
        Action::ChannelSolo,
        Action::ChannelVolume,
        Action::MuteAll,
        Action::UnmuteAll,
        Action::PitchUp,
        Action::PitchDown,
        Action::PitchSet,
        Action::PitchReset,
        Action::FilePrev,
        Action::FileNext,
        Action::FileLoad,
        Action::RecordToggle,
        Action::TriggerPad,
        Action::TriggerPhrase,
        Action::FxOverdriveDrive,
        Action::FxOverdriveMix,
        Action::FxOverdriveToggle,
        Action::FxFilterCutoff,
        Action::FxFilterResonance,
        Action::FxFilterToggle,
        Action::FxEqLow,
        Action::FxEqMid,
        Action::FxEqHigh,
        Action::FxEqToggle,
        Action::FxCompressorThreshold,
        Action::FxCompressorRatio,
        Action::FxCompressorAttack,
        Action::FxCompressorRelease,
        Action::FxCompressorMakeup,
        Action::FxCompressorToggle,
        Action::FxDelayTime,
        Action::FxDelayFeedback,
        Action::FxDelayMix,
        Action::FxDelayToggle,
        Action::Quit,
    ];

    /// Stable numeric id used in the performance log
    #[inline]
    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<Action> {
        usize::try_from(id).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Name used in config and song files
    pub fn name(self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Play => "play",
            Action::Stop => "stop",
            Action::PlayPause => "play_pause",
            Action::Retrigger => "retrigger",
            Action::NextOrder => "next_order",
            Action::PrevOrder => "prev_order",
            Action::JumpToOrder => "jump_to_order",
            Action::JumpToPattern => "jump_to_pattern",
            Action::QueueOrder => "queue_order",
            Action::QueuePattern => "queue_pattern",
            Action::LoopTillRow => "loop_till_row",
            Action::HalveLoop => "halve_loop",
            Action::FullLoop => "full_loop",
            Action::SetLoopStep => "set_loop_step",
            Action::PatternModeToggle => "pattern_mode_toggle",
            Action::ChannelMute => "channel_mute",
            Action::ChannelSolo => "channel_solo",
            Action::ChannelVolume => "channel_volume",
            Action::MuteAll => "mute_all",
            Action::UnmuteAll => "unmute_all",
            Action::PitchUp => "pitch_up",
            Action::PitchDown => "pitch_down",
            Action::PitchSet => "pitch_set",
            Action::PitchReset => "pitch_reset",
            Action::FilePrev => "file_prev",
            Action::FileNext => "file_next",
            Action::FileLoad => "file_load",
            Action::RecordToggle => "record_toggle",
            Action::TriggerPad => "trigger_pad",
            Action::TriggerPhrase => "trigger_phrase",
            Action::FxOverdriveDrive => "fx_overdrive_drive",
            Action::FxOverdriveMix => "fx_overdrive_mix",
            Action::FxOverdriveToggle => "fx_overdrive_toggle",
            Action::FxFilterCutoff => "fx_filter_cutoff",
            Action::FxFilterResonance => "fx_filter_resonance",
            Action::FxFilterToggle => "fx_filter_toggle",
            Action::FxEqLow => "fx_eq_low",
            Action::FxEqMid => "fx_eq_mid",
            Action::FxEqHigh => "fx_eq_high",
            Action::FxEqToggle => "fx_eq_toggle",
            Action::FxCompressorThreshold => "fx_compressor_threshold",
            Action::FxCompressorRatio => "fx_compressor_ratio",
            Action::FxCompressorAttack => "fx_compressor_attack",
            Action::FxCompressorRelease => "fx_compressor_release",
            Action::FxCompressorMakeup => "fx_compressor_makeup",
            Action::FxCompressorToggle => "fx_compressor_toggle",
            Action::FxDelayTime => "fx_delay_time",
            Action::FxDelayFeedback => "fx_delay_feedback",
            Action::FxDelayMix => "fx_delay_mix",
            Action::FxDelayToggle => "fx_delay_toggle",
            Action::Quit => "quit",
        }
    }

    /// Parse an action name; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Action> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }

    /// Continuous controls take their amount from the event value
    pub fn is_continuous(self) -> bool {
        matches!(self, Action::ChannelVolume | Action::PitchSet)
            || matches!(self.fx_target(), Some(FxTarget::Param(..)))
    }

    /// Effect unit and parameter controlled by an `fx_*` action
    pub fn fx_target(self) -> Option<FxTarget> {
        use EffectKind as K;
        let target = match self {
            Action::FxOverdriveDrive => FxTarget::Param(K::Overdrive, 0),
            Action::FxOverdriveMix => FxTarget::Param(K::Overdrive, 1),
            Action::FxOverdriveToggle => FxTarget::Toggle(K::Overdrive),
            Action::FxFilterCutoff => FxTarget::Param(K::Filter, 0),
            Action::FxFilterResonance => FxTarget::Param(K::Filter, 1),
            Action::FxFilterToggle => FxTarget::Toggle(K::Filter),
            Action::FxEqLow => FxTarget::Param(K::Eq, 0),
            Action::FxEqMid => FxTarget::Param(K::Eq, 1),
            Action::FxEqHigh => FxTarget::Param(K::Eq, 2),
            Action::FxEqToggle => FxTarget::Toggle(K::Eq),
            Action::FxCompressorThreshold => FxTarget::Param(K::Compressor, 0),
            Action::FxCompressorRatio => FxTarget::Param(K::Compressor, 1),
            Action::FxCompressorAttack => FxTarget::Param(K::Compressor, 2),
            Action::FxCompressorRelease => FxTarget::Param(K::Compressor, 3),
            Action::FxCompressorMakeup => FxTarget::Param(K::Compressor, 4),
            Action::FxCompressorToggle => FxTarget::Toggle(K::Compressor),
            Action::FxDelayTime => FxTarget::Param(K::Delay, 0),
            Action::FxDelayFeedback => FxTarget::Param(K::Delay, 1),
            Action::FxDelayMix => FxTarget::Param(K::Delay, 2),
            Action::FxDelayToggle => FxTarget::Toggle(K::Delay),
            _ => return None,
        };
        Some(target)
    }

    /// Whether performing this action is captured by the recorder
    ///
    /// Recording control, quitting and file navigation are never recorded.
    /// Pads are recorded as the action they resolve to, and phrases record
    /// the actions their steps dispatch.
    pub fn is_recordable(self) -> bool {
        !matches!(
            self,
            Action::None
                | Action::RecordToggle
                | Action::Quit
                | Action::FilePrev
                | Action::FileNext
                | Action::FileLoad
                | Action::TriggerPad
                | Action::TriggerPhrase
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An action with its parameter and value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionEvent {
    pub action: Action,
    /// Channel, order, pattern, pad, phrase or loop-step index (0 if unused)
    pub parameter: i32,
    /// Continuous amount 0..127
    pub value: u8,
}

impl ActionEvent {
    pub fn new(action: Action, parameter: i32, value: u8) -> Self {
        Self {
            action,
            parameter,
            value: value.min(127),
        }
    }

    /// Parameter as an index, `None` when negative
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.parameter).ok()
    }

    /// Value mapped onto 0.0..=1.0
    pub fn normalized(&self) -> f32 {
        self.value.min(127) as f32 / 127.0
    }
}

/// Where a dispatched action came from
///
/// Replaces hidden re-entrancy flags: performance playback must not be
/// re-recorded, and phrase steps must not trigger phrases or start
/// performance playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchContext {
    /// Keyboard, MIDI or UI input
    #[default]
    User,
    /// Replayed from the performance log
    FromPerformance,
    /// Executed as a phrase step
    FromPhrase,
}
