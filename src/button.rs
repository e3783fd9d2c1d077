//! Logical buttons and raw event classification.
//!
//! Raw events arrive as the kernel's `(type, code, value)` triple. The
//! classifier turns button and wheel events into [`LogicalButton`]s and
//! leaves everything else (motion, sync, misc) as passthrough.

use std::fmt;
use std::str::FromStr;

/// Kernel event type for synchronization markers.
pub const EV_SYN: u16 = 0x00;
/// Kernel event type for keys and buttons.
pub const EV_KEY: u16 = 0x01;
/// Kernel event type for relative axes.
pub const EV_REL: u16 = 0x02;

/// `SYN_REPORT` code.
pub const SYN_REPORT: u16 = 0x00;
/// Vertical wheel axis.
pub const REL_WHEEL: u16 = 0x08;

pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_SIDE: u16 = 0x113;
pub const BTN_EXTRA: u16 = 0x114;
pub const BTN_FORWARD: u16 = 0x115;
pub const BTN_BACK: u16 = 0x116;

/// A raw input event as read from (or written to) an evdev node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Event type (`EV_KEY`, `EV_REL`, ...).
    pub kind: u16,
    /// Type-specific code.
    pub code: u16,
    /// Value: 1 press, 0 release, 2 autorepeat for keys; delta for axes.
    pub value: i32,
}

impl RawEvent {
    pub const fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    pub const fn key(code: u16, value: i32) -> Self {
        Self::new(EV_KEY, code, value)
    }

    pub const fn wheel(value: i32) -> Self {
        Self::new(EV_REL, REL_WHEEL, value)
    }

    pub const fn syn() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }
}

/// The nine buttons the engine knows about.
///
/// Numbering follows the X core protocol, which is also what rule files
/// use for `ButtonN` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalButton {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
    Button6,
    Button7,
    Back,
    Forward,
}

impl LogicalButton {
    pub const ALL: [LogicalButton; 9] = [
        LogicalButton::Left,
        LogicalButton::Middle,
        LogicalButton::Right,
        LogicalButton::ScrollUp,
        LogicalButton::ScrollDown,
        LogicalButton::Button6,
        LogicalButton::Button7,
        LogicalButton::Back,
        LogicalButton::Forward,
    ];

    /// Get the button number (1-indexed, X numbering).
    pub fn number(&self) -> u8 {
        match self {
            LogicalButton::Left => 1,
            LogicalButton::Middle => 2,
            LogicalButton::Right => 3,
            LogicalButton::ScrollUp => 4,
            LogicalButton::ScrollDown => 5,
            LogicalButton::Button6 => 6,
            LogicalButton::Button7 => 7,
            LogicalButton::Back => 8,
            LogicalButton::Forward => 9,
        }
    }

    /// Create a button from its number (1-indexed, X numbering).
    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| b.number() == n)
    }

    /// Map an evdev `BTN_*` code to a logical button.
    pub fn from_evdev(code: u16) -> Option<Self> {
        match code {
            BTN_LEFT => Some(LogicalButton::Left),
            BTN_RIGHT => Some(LogicalButton::Right),
            BTN_MIDDLE => Some(LogicalButton::Middle),
            BTN_SIDE | BTN_BACK => Some(LogicalButton::Back),
            BTN_EXTRA | BTN_FORWARD => Some(LogicalButton::Forward),
            _ => None,
        }
    }

    /// Buttons whose native click is held back while they might start a chord.
    pub fn is_modifier_capable(&self) -> bool {
        matches!(
            self,
            LogicalButton::Right | LogicalButton::Back | LogicalButton::Forward
        )
    }

    /// Buttons subject to the keyboard-modifier bypass.
    pub fn is_chord_tracked(&self) -> bool {
        *self == LogicalButton::Left || self.is_modifier_capable()
    }

    fn bit(&self) -> u16 {
        1 << self.number()
    }
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalButton::Left => "LButton",
            LogicalButton::Middle => "MButton",
            LogicalButton::Right => "RButton",
            LogicalButton::ScrollUp => "ScrollUp",
            LogicalButton::ScrollDown => "ScrollDown",
            LogicalButton::Button6 => "Button6",
            LogicalButton::Button7 => "Button7",
            LogicalButton::Back => "BButton",
            LogicalButton::Forward => "FButton",
        };
        f.write_str(name)
    }
}

impl FromStr for LogicalButton {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("Button") {
            return n
                .parse::<u8>()
                .ok()
                .and_then(LogicalButton::from_number)
                .ok_or_else(|| format!("no such button: {s}"));
        }
        let button = match s.to_ascii_lowercase().as_str() {
            "lbutton" => LogicalButton::Left,
            "mbutton" => LogicalButton::Middle,
            "rbutton" => LogicalButton::Right,
            "bbutton" => LogicalButton::Back,
            "fbutton" => LogicalButton::Forward,
            "scrollup" => LogicalButton::ScrollUp,
            "scrolldown" => LogicalButton::ScrollDown,
            _ => return Err(format!("unknown button name: {s}")),
        };
        Ok(button)
    }
}

/// A set of logical buttons, one bit per button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSet(u16);

impl ButtonSet {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Add a button. Returns false if it was already present.
    pub fn insert(&mut self, button: LogicalButton) -> bool {
        let present = self.contains(button);
        self.0 |= button.bit();
        !present
    }

    /// Remove a button. Returns true if it was present.
    pub fn remove(&mut self, button: LogicalButton) -> bool {
        let present = self.contains(button);
        self.0 &= !button.bit();
        present
    }

    pub fn contains(&self, button: LogicalButton) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = LogicalButton> + '_ {
        LogicalButton::ALL
            .into_iter()
            .filter(move |b| self.contains(*b))
    }
}

/// Press/release state of a button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Press,
    Release,
}

/// Result of classifying one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    /// A known button went down or up.
    Button(LogicalButton, Transition),
    /// One wheel detent, as `ScrollUp` or `ScrollDown`.
    Scroll(LogicalButton),
    /// Anything else: motion, sync, autorepeat, unknown codes, zero deltas.
    Passthrough,
}

/// Classify a raw event.
pub fn classify(event: &RawEvent) -> Classified {
    match event.kind {
        EV_KEY => {
            let Some(button) = LogicalButton::from_evdev(event.code) else {
                log::trace!("unknown button code 0x{:x}", event.code);
                return Classified::Passthrough;
            };
            match event.value {
                1 => Classified::Button(button, Transition::Press),
                0 => Classified::Button(button, Transition::Release),
                _ => Classified::Passthrough,
            }
        }
        EV_REL if event.code == REL_WHEEL => match event.value {
            v if v > 0 => Classified::Scroll(LogicalButton::ScrollUp),
            v if v < 0 => Classified::Scroll(LogicalButton::ScrollDown),
            _ => Classified::Passthrough,
        },
        _ => Classified::Passthrough,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_numbers() {
        for button in LogicalButton::ALL {
            assert_eq!(LogicalButton::from_number(button.number()), Some(button));
        }
        assert_eq!(LogicalButton::from_number(0), None);
        assert_eq!(LogicalButton::from_number(10), None);
    }

    #[test]
    fn test_evdev_mapping() {
        assert_eq!(LogicalButton::from_evdev(BTN_LEFT), Some(LogicalButton::Left));
        assert_eq!(LogicalButton::from_evdev(BTN_RIGHT), Some(LogicalButton::Right));
        assert_eq!(LogicalButton::from_evdev(BTN_MIDDLE), Some(LogicalButton::Middle));
        assert_eq!(LogicalButton::from_evdev(BTN_SIDE), Some(LogicalButton::Back));
        assert_eq!(LogicalButton::from_evdev(BTN_BACK), Some(LogicalButton::Back));
        assert_eq!(LogicalButton::from_evdev(BTN_EXTRA), Some(LogicalButton::Forward));
        assert_eq!(LogicalButton::from_evdev(BTN_FORWARD), Some(LogicalButton::Forward));
        assert_eq!(LogicalButton::from_evdev(0x117), None);
    }

    #[test]
    fn test_parse_button_names() {
        assert_eq!("RButton".parse(), Ok(LogicalButton::Right));
        assert_eq!("lbutton".parse(), Ok(LogicalButton::Left));
        assert_eq!("ScrollDown".parse(), Ok(LogicalButton::ScrollDown));
        assert_eq!("Button8".parse(), Ok(LogicalButton::Back));
        assert_eq!("Button6".parse(), Ok(LogicalButton::Button6));
        assert!("Button12".parse::<LogicalButton>().is_err());
        assert!("XButton".parse::<LogicalButton>().is_err());
    }

    #[test]
    fn test_button_set() {
        let mut set = ButtonSet::new();
        assert!(set.is_empty());
        assert!(set.insert(LogicalButton::Right));
        assert!(!set.insert(LogicalButton::Right));
        assert!(set.insert(LogicalButton::Forward));
        assert_eq!(set.len(), 2);
        assert!(set.contains(LogicalButton::Right));
        assert!(!set.contains(LogicalButton::Left));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![LogicalButton::Right, LogicalButton::Forward]
        );
        assert!(set.remove(LogicalButton::Right));
        assert!(!set.remove(LogicalButton::Right));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&RawEvent::key(BTN_RIGHT, 1)),
            Classified::Button(LogicalButton::Right, Transition::Press)
        );
        assert_eq!(
            classify(&RawEvent::key(BTN_SIDE, 0)),
            Classified::Button(LogicalButton::Back, Transition::Release)
        );
        assert_eq!(classify(&RawEvent::key(BTN_LEFT, 2)), Classified::Passthrough);
        assert_eq!(classify(&RawEvent::key(0x117, 1)), Classified::Passthrough);
        assert_eq!(
            classify(&RawEvent::wheel(1)),
            Classified::Scroll(LogicalButton::ScrollUp)
        );
        assert_eq!(
            classify(&RawEvent::wheel(-2)),
            Classified::Scroll(LogicalButton::ScrollDown)
        );
        assert_eq!(classify(&RawEvent::wheel(0)), Classified::Passthrough);
        assert_eq!(classify(&RawEvent::new(EV_REL, 0x00, 5)), Classified::Passthrough);
        assert_eq!(classify(&RawEvent::syn()), Classified::Passthrough);
    }
}
