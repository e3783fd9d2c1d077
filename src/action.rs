//! Synthesized key combinations and the button pairs that trigger them.

use std::fmt;
use std::str::FromStr;

use crate::button::LogicalButton;
use crate::keycode::Key;

bitflags::bitflags! {
    /// Keyboard modifiers held during a synthesized key press.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL  = 1 << 1;
        const ALT   = 1 << 2;
        const SUPER = 1 << 3;
    }
}

impl Modifiers {
    /// Press order. Releases go in reverse.
    pub const PRESS_ORDER: [Modifiers; 4] = [
        Modifiers::CTRL,
        Modifiers::SHIFT,
        Modifiers::ALT,
        Modifiers::SUPER,
    ];

    /// The key used to hold this modifier when injecting.
    ///
    /// Only meaningful for single-bit values.
    pub fn key(self) -> Option<Key> {
        if self == Modifiers::CTRL {
            Some(Key::ControlLeft)
        } else if self == Modifiers::SHIFT {
            Some(Key::ShiftLeft)
        } else if self == Modifiers::ALT {
            Some(Key::AltLeft)
        } else if self == Modifiers::SUPER {
            Some(Key::MetaLeft)
        } else {
            None
        }
    }

    fn parse_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ctrl" => Some(Modifiers::CTRL),
            "shift" => Some(Modifiers::SHIFT),
            "alt" => Some(Modifiers::ALT),
            "super" => Some(Modifiers::SUPER),
            _ => None,
        }
    }
}

/// A key combination: zero or more modifiers plus one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl Action {
    pub fn new(modifiers: Modifiers, key: Key) -> Self {
        Self { modifiers, key }
    }

    /// Modifiers in press order, as the keys that hold them.
    pub fn modifier_keys(&self) -> impl Iterator<Item = Key> + '_ {
        Modifiers::PRESS_ORDER
            .into_iter()
            .filter(|m| self.modifiers.contains(*m))
            .filter_map(Modifiers::key)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (modifier, name) in [
            (Modifiers::CTRL, "Ctrl"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SUPER, "Super"),
        ] {
            if self.modifiers.contains(modifier) {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for Action {
    type Err = String;

    /// Parse `Ctrl+Shift+Tab` style strings. Modifiers come first and
    /// exactly one key name ends the string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((last, leading)) = tokens.split_last() else {
            return Err(format!("no key in action: {s}"));
        };
        if last.is_empty() {
            return Err(format!("no key in action: {s}"));
        }

        let mut modifiers = Modifiers::empty();
        for token in leading {
            match Modifiers::parse_name(token) {
                Some(m) => modifiers |= m,
                None => return Err(format!("unknown modifier {token:?} in action: {s}")),
            }
        }

        let key: Key = last.parse().map_err(|e| format!("{e} in action: {s}"))?;
        Ok(Action { modifiers, key })
    }
}

/// Lookup key for a binding: a first button and an optional second one.
///
/// `second == None` is a standalone binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub first: LogicalButton,
    pub second: Option<LogicalButton>,
}

impl BindingKey {
    pub fn standalone(first: LogicalButton) -> Self {
        Self {
            first,
            second: None,
        }
    }

    pub fn chord(first: LogicalButton, second: LogicalButton) -> Self {
        Self {
            first,
            second: Some(second),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.second {
            Some(second) => write!(f, "{} & {}", self.first, second),
            None => write!(f, "{}", self.first),
        }
    }
}
