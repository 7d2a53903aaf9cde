use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A key press with its modifier state.
///
/// `key` follows the DOM `KeyboardEvent.key` naming (`"Tab"`, `"F11"`,
/// `"Meta"`, `"u"`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyCombo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    fn key_is(&self, name: &str) -> bool {
        self.key.eq_ignore_ascii_case(name)
    }

    /// Application switching, full-screen toggle, developer tools or view
    /// source.
    pub fn is_circumvention(&self) -> bool {
        (self.alt && self.key_is("Tab"))
            || (self.ctrl && self.key_is("Tab"))
            || self.key_is("Meta")
            || self.key_is("F11")
            || self.key_is("F12")
            || (self.ctrl && self.shift && self.key_is("I"))
            || (self.ctrl && self.key_is("U"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid key combo '{0}'")]
pub struct ParseKeyComboError(pub String);

/// Parses `"ctrl+shift+i"`, `"alt+tab"`, `"F12"`.
impl FromStr for KeyCombo {
    type Err = ParseKeyComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut combo = KeyCombo::default();
        let mut key = None;
        for part in s.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "" => return Err(ParseKeyComboError(s.to_string())),
                "ctrl" | "control" => combo.ctrl = true,
                "alt" => combo.alt = true,
                "shift" => combo.shift = true,
                "meta" | "win" | "cmd" if key.is_none() && !s.trim().contains('+') => {
                    key = Some("Meta".to_string())
                }
                "meta" | "win" | "cmd" => combo.meta = true,
                _ if key.is_some() => return Err(ParseKeyComboError(s.to_string())),
                _ => key = Some(part.to_string()),
            }
        }
        combo.key = key.ok_or_else(|| ParseKeyComboError(s.to_string()))?;
        Ok(combo)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [
            (self.ctrl, "ctrl"),
            (self.alt, "alt"),
            (self.shift, "shift"),
            (self.meta, "meta"),
        ] {
            if on {
                write!(f, "{name}+")?;
            }
        }
        f.write_str(&self.key)
    }
}
