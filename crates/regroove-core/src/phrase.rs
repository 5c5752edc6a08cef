//! Phrases: named, row-timed action sequences
//!
//! A phrase is a list of steps, each firing an action a number of rows
//! after the phrase was triggered. Only one phrase runs at a time; the
//! [`PhraseEngine`] tracks it and is advanced once per playback row.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionEvent};

/// Maximum number of phrases per song
pub const MAX_PHRASES: usize = 64;
/// Maximum number of steps per phrase
pub const MAX_PHRASE_STEPS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseStep {
    pub action: Action,
    pub parameter: i32,
    pub value: u8,
    /// Rows after the trigger at which this step fires
    pub position_rows: u32,
}

impl PhraseStep {
    pub fn new(action: Action, parameter: i32, value: u8, position_rows: u32) -> Self {
        Self {
            action,
            parameter,
            value: value.min(127),
            position_rows,
        }
    }

    pub fn event(&self) -> ActionEvent {
        ActionEvent::new(self.action, self.parameter, self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub name: String,
    steps: Vec<PhraseStep>,
}

impl Phrase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[PhraseStep] {
        &self.steps
    }

    /// Insert a step, keeping steps ordered by position
    ///
    /// Steps at the same position fire in insertion order.
    pub fn add_step(&mut self, step: PhraseStep) -> bool {
        if self.steps.len() >= MAX_PHRASE_STEPS {
            return false;
        }
        let at = self
            .steps
            .partition_point(|s| s.position_rows <= step.position_rows);
        self.steps.insert(at, step);
        true
    }

    pub fn remove_step(&mut self, index: usize) -> Option<PhraseStep> {
        (index < self.steps.len()).then(|| self.steps.remove(index))
    }

    /// Row of the last step, i.e. the phrase length minus one
    pub fn length_rows(&self) -> u32 {
        self.steps.last().map_or(0, |s| s.position_rows)
    }
}

/// The song's phrase list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseBank {
    phrases: Vec<Phrase>,
}

impl PhraseBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn get(&self, index: usize) -> Option<&Phrase> {
        self.phrases.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Phrase> {
        self.phrases.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Append a phrase, returning its index
    pub fn add(&mut self, phrase: Phrase) -> Option<usize> {
        if self.phrases.len() >= MAX_PHRASES {
            log::warn!("Phrases: limit of {} reached", MAX_PHRASES);
            return None;
        }
        self.phrases.push(phrase);
        Some(self.phrases.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> Option<Phrase> {
        (index < self.phrases.len()).then(|| self.phrases.remove(index))
    }

    pub fn clear(&mut self) {
        self.phrases.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActivePhrase {
    index: usize,
    current_step: usize,
    delay: u32,
}

/// Outcome of advancing the active phrase by one row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseTick {
    /// Step actions due on this row, in order
    pub fired: Vec<ActionEvent>,
    /// The phrase ended on this row
    pub completed: bool,
}

/// Runs at most one phrase at a time
#[derive(Debug, Clone, Default)]
pub struct PhraseEngine {
    active: Option<ActivePhrase>,
}

impl PhraseEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active.map(|a| a.index)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Start a phrase, replacing any running one
    ///
    /// Returns the steps due immediately (position 0), or `None` if the
    /// phrase does not exist or has no steps.
    pub fn trigger(&mut self, bank: &PhraseBank, index: usize) -> Option<Vec<ActionEvent>> {
        let phrase = bank.get(index).filter(|p| !p.steps.is_empty())?;
        if let Some(prev) = self.active {
            log::debug!("Phrase {} replaces phrase {}", index, prev.index);
        }
        let mut active = ActivePhrase {
            index,
            current_step: 0,
            delay: phrase.steps[0].position_rows,
        };
        let mut fired = Vec::new();
        fire_due(phrase, &mut active, &mut fired);
        self.active = Some(active);
        Some(fired)
    }

    /// Advance the running phrase by one row
    ///
    /// A phrase completes on the row after its last step fired.
    pub fn on_row(&mut self, bank: &PhraseBank) -> PhraseTick {
        let mut tick = PhraseTick::default();
        let Some(mut active) = self.active else {
            return tick;
        };
        let Some(phrase) = bank.get(active.index) else {
            self.active = None;
            return tick;
        };

        if active.current_step >= phrase.steps.len() {
            self.active = None;
            tick.completed = true;
            return tick;
        }

        active.delay = active.delay.saturating_sub(1);
        fire_due(phrase, &mut active, &mut tick.fired);
        self.active = Some(active);
        tick
    }
}

fn fire_due(phrase: &Phrase, active: &mut ActivePhrase, fired: &mut Vec<ActionEvent>) {
    while active.delay == 0 {
        let Some(step) = phrase.steps.get(active.current_step) else {
            break;
        };
        fired.push(step.event());
        active.current_step += 1;
        if let Some(next) = phrase.steps.get(active.current_step) {
            active.delay = next.position_rows - step.position_rows;
        }
    }
}
