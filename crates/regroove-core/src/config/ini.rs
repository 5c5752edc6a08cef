//! Minimal line-based INI reader shared by the config and song files
//!
//! Sections are `[name]`, entries `key = value` (spaces optional). Lines
//! starting with `;` or `#` are comments. Duplicate keys are kept in file
//! order, since several mappings may share one key.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigParseError {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl ConfigParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniEntry {
    pub line: usize,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<IniEntry>,
}

impl IniSection {
    /// Last value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    pub sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn parse(text: &str) -> Result<Self, ConfigParseError> {
        let mut doc = IniDocument::default();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| ConfigParseError::new(line, "unterminated section header"))?;
                doc.sections.push(IniSection {
                    name: name.trim().to_string(),
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or_else(|| ConfigParseError::new(line, format!("expected key = value, got {trimmed:?}")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigParseError::new(line, "empty key"));
            }
            let section = doc
                .sections
                .last_mut()
                .ok_or_else(|| ConfigParseError::new(line, format!("key {key:?} outside of any section")))?;
            section.entries.push(IniEntry {
                line,
                key: key.to_string(),
                value: value.trim().to_string(),
            });
        }
        Ok(doc)
    }

    /// First section named `name` (section names are case-sensitive)
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// Quote a string value, escaping `\`, `"` and newlines
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`quote`]; unquoted values are returned as-is
pub fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split a comma-separated value into trimmed fields
pub fn fields(value: &str) -> Vec<&str> {
    value.split(',').map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections_and_duplicates() {
        let doc = IniDocument::parse(
            "; comment\n[midi]\ncc1 = filter, 0\ncc1=play,0\n\n[keyboard]\nkeya = play,0\n",
        )
        .unwrap();
        let midi = doc.section("midi").unwrap();
        assert_eq!(midi.entries.len(), 2);
        assert_eq!(midi.entries[0].value, "filter, 0");
        assert_eq!(midi.entries[1].line, 4);
        assert_eq!(midi.get("cc1"), Some("play,0"));
        assert!(doc.section("Keyboard").is_none());
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = IniDocument::parse("[a]\nbroken line\n").unwrap_err();
        assert_eq!(err.line, 2);

        let err = IniDocument::parse("key = 1\n").unwrap_err();
        assert_eq!(err.line, 1);

        assert!(IniDocument::parse("[open\n").is_err());
    }

    #[test]
    fn test_quote_unquote() {
        let text = "Drop \"B\" \\ here\nnext";
        let quoted = quote(text);
        assert!(!quoted.contains('\n'));
        assert_eq!(unquote(&quoted), text);
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\"\""), "");
    }

    #[test]
    fn test_fields() {
        assert_eq!(fields("play, 3 ,1"), vec!["play", "3", "1"]);
    }
}
