//! Key identities that an action can synthesize.
//!
//! A [`Key`] is layout independent. It carries the X keysym of its
//! unshifted symbol, and the window system turns that into a physical
//! keycode at dispatch time.

use std::fmt;
use std::str::FromStr;

/// Keyboard keys a binding can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // Letters
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
    KeyG,
    KeyH,
    KeyI,
    KeyJ,
    KeyK,
    KeyL,
    KeyM,
    KeyN,
    KeyO,
    KeyP,
    KeyQ,
    KeyR,
    KeyS,
    KeyT,
    KeyU,
    KeyV,
    KeyW,
    KeyX,
    KeyY,
    KeyZ,

    // Numbers (top row)
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,

    // Function keys
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,

    // Modifiers
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    MetaLeft, // Windows/Super
    MetaRight,

    // Navigation
    Escape,
    Tab,
    CapsLock,
    Space,
    Enter,
    Backspace,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PrintScreen,
    Pause,

    // Punctuation and symbols
    Grave,        // ` ~
    Minus,        // - _
    Equal,        // = +
    BracketLeft,  // [ {
    BracketRight, // ] }
    Backslash,    // \ |
    Semicolon,    // ; :
    Quote,        // ' "
    Comma,        // , <
    Period,       // . >
    Slash,        // / ?

    // Media keys
    VolumeUp,
    VolumeDown,
    VolumeMute,
    MediaPlayPause,
    MediaStop,
    MediaNext,
    MediaPrevious,

    // Browser keys
    BrowserBack,
    BrowserForward,
    BrowserRefresh,
    BrowserHome,
}

const LETTERS: [Key; 26] = [
    Key::KeyA,
    Key::KeyB,
    Key::KeyC,
    Key::KeyD,
    Key::KeyE,
    Key::KeyF,
    Key::KeyG,
    Key::KeyH,
    Key::KeyI,
    Key::KeyJ,
    Key::KeyK,
    Key::KeyL,
    Key::KeyM,
    Key::KeyN,
    Key::KeyO,
    Key::KeyP,
    Key::KeyQ,
    Key::KeyR,
    Key::KeyS,
    Key::KeyT,
    Key::KeyU,
    Key::KeyV,
    Key::KeyW,
    Key::KeyX,
    Key::KeyY,
    Key::KeyZ,
];

const DIGITS: [Key; 10] = [
    Key::Num0,
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

const FUNCTION_KEYS: [Key; 24] = [
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
    Key::F13,
    Key::F14,
    Key::F15,
    Key::F16,
    Key::F17,
    Key::F18,
    Key::F19,
    Key::F20,
    Key::F21,
    Key::F22,
    Key::F23,
    Key::F24,
];

/// Named keys, in the spelling used for display. Aliases are handled in
/// [`Key::from_str`].
const NAMED: [(&str, Key); 37] = [
    ("ShiftL", Key::ShiftLeft),
    ("ShiftR", Key::ShiftRight),
    ("CtrlL", Key::ControlLeft),
    ("CtrlR", Key::ControlRight),
    ("AltL", Key::AltLeft),
    ("AltR", Key::AltRight),
    ("SuperL", Key::MetaLeft),
    ("SuperR", Key::MetaRight),
    ("Escape", Key::Escape),
    ("Tab", Key::Tab),
    ("CapsLock", Key::CapsLock),
    ("Space", Key::Space),
    ("Enter", Key::Enter),
    ("Backspace", Key::Backspace),
    ("Insert", Key::Insert),
    ("Delete", Key::Delete),
    ("Home", Key::Home),
    ("End", Key::End),
    ("PageUp", Key::PageUp),
    ("PageDown", Key::PageDown),
    ("ArrowUp", Key::ArrowUp),
    ("ArrowDown", Key::ArrowDown),
    ("ArrowLeft", Key::ArrowLeft),
    ("ArrowRight", Key::ArrowRight),
    ("PrintScreen", Key::PrintScreen),
    ("Pause", Key::Pause),
    ("VolumeUp", Key::VolumeUp),
    ("VolumeDown", Key::VolumeDown),
    ("VolumeMute", Key::VolumeMute),
    ("MediaPlayPause", Key::MediaPlayPause),
    ("MediaStop", Key::MediaStop),
    ("MediaNext", Key::MediaNext),
    ("MediaPrevious", Key::MediaPrevious),
    ("BrowserBack", Key::BrowserBack),
    ("BrowserForward", Key::BrowserForward),
    ("BrowserRefresh", Key::BrowserRefresh),
    ("BrowserHome", Key::BrowserHome),
];

const PUNCTUATION: [(char, Key); 11] = [
    ('`', Key::Grave),
    ('-', Key::Minus),
    ('=', Key::Equal),
    ('[', Key::BracketLeft),
    (']', Key::BracketRight),
    ('\\', Key::Backslash),
    (';', Key::Semicolon),
    ('\'', Key::Quote),
    (',', Key::Comma),
    ('.', Key::Period),
    ('/', Key::Slash),
];

impl Key {
    /// The X keysym of the key's unshifted symbol.
    pub fn keysym(&self) -> u32 {
        if let Some(i) = LETTERS.iter().position(|k| k == self) {
            return 0x61 + i as u32; // XK_a..XK_z
        }
        if let Some(i) = DIGITS.iter().position(|k| k == self) {
            return 0x30 + i as u32; // XK_0..XK_9
        }
        if let Some(i) = FUNCTION_KEYS.iter().position(|k| k == self) {
            return 0xffbe + i as u32; // XK_F1..XK_F24
        }
        match self {
            Key::ShiftLeft => 0xffe1,
            Key::ShiftRight => 0xffe2,
            Key::ControlLeft => 0xffe3,
            Key::ControlRight => 0xffe4,
            Key::CapsLock => 0xffe5,
            Key::AltLeft => 0xffe9,
            Key::AltRight => 0xffea,
            Key::MetaLeft => 0xffeb,
            Key::MetaRight => 0xffec,

            Key::Escape => 0xff1b,
            Key::Tab => 0xff09,
            Key::Space => 0x0020,
            Key::Enter => 0xff0d,
            Key::Backspace => 0xff08,
            Key::Insert => 0xff63,
            Key::Delete => 0xffff,
            Key::Home => 0xff50,
            Key::End => 0xff57,
            Key::PageUp => 0xff55,
            Key::PageDown => 0xff56,
            Key::ArrowLeft => 0xff51,
            Key::ArrowUp => 0xff52,
            Key::ArrowRight => 0xff53,
            Key::ArrowDown => 0xff54,
            Key::PrintScreen => 0xff61,
            Key::Pause => 0xff13,

            Key::Grave => 0x0060,
            Key::Minus => 0x002d,
            Key::Equal => 0x003d,
            Key::BracketLeft => 0x005b,
            Key::BracketRight => 0x005d,
            Key::Backslash => 0x005c,
            Key::Semicolon => 0x003b,
            Key::Quote => 0x0027,
            Key::Comma => 0x002c,
            Key::Period => 0x002e,
            Key::Slash => 0x002f,

            // XF86 vendor keysyms
            Key::VolumeDown => 0x1008_ff11,
            Key::VolumeMute => 0x1008_ff12,
            Key::VolumeUp => 0x1008_ff13,
            Key::MediaPlayPause => 0x1008_ff14,
            Key::MediaStop => 0x1008_ff15,
            Key::MediaPrevious => 0x1008_ff16,
            Key::MediaNext => 0x1008_ff17,
            Key::BrowserHome => 0x1008_ff18,
            Key::BrowserBack => 0x1008_ff26,
            Key::BrowserForward => 0x1008_ff27,
            Key::BrowserRefresh => 0x1008_ff29,

            // Letters, digits and function keys returned above.
            _ => 0,
        }
    }

    fn from_char(c: char) -> Option<Key> {
        let lower = c.to_ascii_lowercase();
        if lower.is_ascii_lowercase() {
            return Some(LETTERS[(lower as u8 - b'a') as usize]);
        }
        if c.is_ascii_digit() {
            return Some(DIGITS[(c as u8 - b'0') as usize]);
        }
        PUNCTUATION
            .iter()
            .find(|(p, _)| *p == c)
            .map(|(_, key)| *key)
    }
}

/// Error returned when a key name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key: {}", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for Key {
    type Err = UnknownKey;

    /// Parse a key name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Key::from_char(c).ok_or_else(|| UnknownKey(s.to_string()));
        }

        let alias = match s.to_ascii_lowercase().as_str() {
            "return" => Some(Key::Enter),
            "esc" => Some(Key::Escape),
            "left" => Some(Key::ArrowLeft),
            "right" => Some(Key::ArrowRight),
            "up" => Some(Key::ArrowUp),
            "down" => Some(Key::ArrowDown),
            "pgup" => Some(Key::PageUp),
            "pgdn" => Some(Key::PageDown),
            _ => None,
        };
        if let Some(key) = alias {
            return Ok(key);
        }

        if let Some((_, key)) = NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
        {
            return Ok(*key);
        }

        if let Some(n) = s
            .strip_prefix('F')
            .or_else(|| s.strip_prefix('f'))
            .and_then(|n| n.parse::<usize>().ok())
            && (1..=FUNCTION_KEYS.len()).contains(&n)
        {
            return Ok(FUNCTION_KEYS[n - 1]);
        }

        Err(UnknownKey(s.to_string()))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(i) = LETTERS.iter().position(|k| k == self) {
            return write!(f, "{}", (b'A' + i as u8) as char);
        }
        if let Some(i) = DIGITS.iter().position(|k| k == self) {
            return write!(f, "{}", i);
        }
        if let Some(i) = FUNCTION_KEYS.iter().position(|k| k == self) {
            return write!(f, "F{}", i + 1);
        }
        if let Some((c, _)) = PUNCTUATION.iter().find(|(_, k)| k == self) {
            return write!(f, "{}", c);
        }
        let name = NAMED
            .iter()
            .find(|(_, k)| k == self)
            .map(|(name, _)| *name)
            .unwrap_or("?");
        f.write_str(name)
    }
}
