//! Keyboard mapping
//!
//! Keys are normalized to a canonical [`KeyCode`]: printable characters are
//! lowercased, and keys that cannot appear literally in a config key get a
//! fixed name (`key_space`, `key_lbracket`, `key_kp5`, ...).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionEvent};

/// Canonical key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyCode {
    /// Printable character, lowercased
    Char(char),
    Space,
    Tab,
    Backspace,
    Escape,
    Enter,
    /// Numeric keypad digit 0..9
    Keypad(u8),
}

/// Characters that are written by name in config keys
const NAMED_CHARS: [(char, &str); 5] = [
    ('[', "lbracket"),
    (']', "rbracket"),
    ('+', "plus"),
    ('-', "minus"),
    ('=', "equals"),
];

impl KeyCode {
    /// Normalize a typed character
    pub fn from_char(c: char) -> Self {
        match c {
            ' ' => KeyCode::Space,
            '\t' => KeyCode::Tab,
            '\x08' | '\x7f' => KeyCode::Backspace,
            '\x1b' => KeyCode::Escape,
            '\n' | '\r' => KeyCode::Enter,
            c => KeyCode::Char(c.to_lowercase().next().unwrap_or(c)),
        }
    }

    /// Whether the config file can store a binding for this key
    ///
    /// Whitespace and control characters without a name would be trimmed
    /// or mangled by the config parser.
    pub fn is_bindable(self) -> bool {
        match self {
            KeyCode::Char(c) => !c.is_whitespace() && !c.is_control(),
            _ => true,
        }
    }

    /// Config key for this code (`key<c>` or `key_<name>`)
    pub fn config_key(self) -> String {
        match self {
            KeyCode::Space => "key_space".to_string(),
            KeyCode::Tab => "key_tab".to_string(),
            KeyCode::Backspace => "key_backspace".to_string(),
            KeyCode::Escape => "key_esc".to_string(),
            KeyCode::Enter => "key_enter".to_string(),
            KeyCode::Keypad(n) => format!("key_kp{}", n),
            KeyCode::Char(c) => match NAMED_CHARS.iter().find(|(nc, _)| *nc == c) {
                Some((_, name)) => format!("key_{}", name),
                None => format!("key{}", c),
            },
        }
    }

    /// Parse a config key; `None` for anything that is not a key binding
    pub fn from_config_key(key: &str) -> Option<Self> {
        let rest = key.strip_prefix("key")?;
        if let Some(name) = rest.strip_prefix('_') {
            if !name.is_empty() {
                return Self::from_name(name);
            }
        }
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(Self::from_char(c)),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "space" => Some(KeyCode::Space),
            "tab" => Some(KeyCode::Tab),
            "backspace" => Some(KeyCode::Backspace),
            "esc" => Some(KeyCode::Escape),
            "enter" => Some(KeyCode::Enter),
            _ => {
                if let Some(digit) = name.strip_prefix("kp") {
                    return digit.parse::<u8>().ok().filter(|d| *d <= 9).map(KeyCode::Keypad);
                }
                NAMED_CHARS
                    .iter()
                    .find(|(_, n)| *n == name)
                    .map(|(c, _)| KeyCode::Char(*c))
            }
        }
    }
}

/// A key bound to an action and parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: KeyCode,
    pub action: Action,
    pub parameter: i32,
}

/// Single lookup table from key code to action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardMap {
    bindings: HashMap<KeyCode, (Action, i32)>,
}

impl KeyboardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in bindings used when the config has no `[keyboard]` section
    pub fn with_defaults() -> Self {
        let mut map = Self::new();
        let defaults: [(KeyCode, Action, i32); 20] = [
            (KeyCode::Space, Action::PlayPause, 0),
            (KeyCode::Char('q'), Action::Quit, 0),
            (KeyCode::Escape, Action::Quit, 0),
            (KeyCode::Char('n'), Action::NextOrder, 0),
            (KeyCode::Char('p'), Action::PrevOrder, 0),
            (KeyCode::Char('r'), Action::Retrigger, 0),
            (KeyCode::Char('l'), Action::LoopTillRow, 0),
            (KeyCode::Char('m'), Action::PatternModeToggle, 0),
            (KeyCode::Char('h'), Action::HalveLoop, 0),
            (KeyCode::Char('f'), Action::FullLoop, 0),
            (KeyCode::Char('o'), Action::RecordToggle, 0),
            (KeyCode::Char('u'), Action::UnmuteAll, 0),
            (KeyCode::Char('+'), Action::PitchUp, 0),
            (KeyCode::Char('-'), Action::PitchDown, 0),
            (KeyCode::Char('='), Action::PitchReset, 0),
            (KeyCode::Char('['), Action::FilePrev, 0),
            (KeyCode::Char(']'), Action::FileNext, 0),
            (KeyCode::Enter, Action::FileLoad, 0),
            (KeyCode::Char('1'), Action::ChannelMute, 0),
            (KeyCode::Char('2'), Action::ChannelMute, 1),
        ];
        for (key, action, parameter) in defaults {
            map.bind(key, action, parameter);
        }
        for ch in 2..8 {
            let digit = char::from(b'1' + ch as u8);
            map.bind(KeyCode::Char(digit), Action::ChannelMute, ch);
        }
        map
    }

    pub fn bind(&mut self, key: KeyCode, action: Action, parameter: i32) {
        self.bindings.insert(key, (action, parameter));
    }

    pub fn unbind(&mut self, key: KeyCode) -> bool {
        self.bindings.remove(&key).is_some()
    }

    /// Bind, or unbind if exactly this binding already exists
    ///
    /// Returns `true` when the binding is present afterwards.
    pub fn toggle(&mut self, key: KeyCode, action: Action, parameter: i32) -> bool {
        if self.bindings.get(&key) == Some(&(action, parameter)) {
            self.bindings.remove(&key);
            false
        } else {
            self.bindings.insert(key, (action, parameter));
            true
        }
    }

    pub fn lookup(&self, key: KeyCode) -> Option<ActionEvent> {
        self.bindings
            .get(&key)
            .filter(|(action, _)| *action != Action::None)
            .map(|&(action, parameter)| ActionEvent::new(action, parameter, 127))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings sorted by key, for stable output
    pub fn bindings(&self) -> Vec<KeyBinding> {
        let mut out: Vec<KeyBinding> = self
            .bindings
            .iter()
            .map(|(&key, &(action, parameter))| KeyBinding {
                key,
                action,
                parameter,
            })
            .collect();
        out.sort_by_key(|b| b.key);
        out
    }
}
