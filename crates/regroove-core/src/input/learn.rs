//! Learn mode state
//!
//! While a target is armed, the next matching keyboard key, MIDI CC or MIDI
//! note is assigned to it. The session applies the assignment and persists
//! it; this type only tracks what is armed.

use crate::action::Action;

/// What the next input event will be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnTarget {
    /// A key or CC mapping for an action and parameter
    Action { action: Action, parameter: i32 },
    /// The MIDI note of a trigger pad (0..15 application, 16..31 song)
    Pad(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearnState {
    target: Option<LearnTarget>,
}

impl LearnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm learn mode, replacing any previous target
    pub fn start(&mut self, target: LearnTarget) {
        log::info!("Learn: waiting for input for {:?}", target);
        self.target = Some(target);
    }

    pub fn cancel(&mut self) {
        if self.target.take().is_some() {
            log::info!("Learn: cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<LearnTarget> {
        self.target
    }

    /// Disarm and return the target an input event should be assigned to
    pub fn take(&mut self) -> Option<LearnTarget> {
        self.target.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learn_lifecycle() {
        let mut learn = LearnState::new();
        assert!(!learn.is_active());

        learn.start(LearnTarget::Pad(3));
        assert!(learn.is_active());
        learn.start(LearnTarget::Action {
            action: Action::ChannelMute,
            parameter: 1,
        });
        assert_eq!(
            learn.target(),
            Some(LearnTarget::Action {
                action: Action::ChannelMute,
                parameter: 1
            })
        );

        assert!(learn.take().is_some());
        assert!(!learn.is_active());
        assert!(learn.take().is_none());

        learn.start(LearnTarget::Pad(0));
        learn.cancel();
        assert!(!learn.is_active());
    }
}
