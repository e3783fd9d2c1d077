//! Window-system capability and target window resolution.

use std::fmt;
use std::os::fd::RawFd;

use log::debug;

use crate::action::Modifiers;
use crate::error::Result;
use crate::keycode::Key;

/// Opaque window identifier (an X resource id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Instance and class names from a window's `WM_CLASS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassHint {
    pub instance: String,
    pub class: String,
}

impl ClassHint {
    pub fn new(instance: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            class: class.into(),
        }
    }
}

/// Parse a raw `WM_CLASS` value: instance NUL class NUL.
///
/// Returns `None` for an empty property. A missing class yields an
/// empty class string.
pub fn parse_wm_class(data: &[u8]) -> Option<ClassHint> {
    if data.is_empty() {
        return None;
    }
    let mut parts = data.split(|&b| b == 0);
    let instance = parts.next().unwrap_or_default();
    let class = parts.next().unwrap_or_default();
    Some(ClassHint {
        instance: String::from_utf8_lossy(instance).into_owned(),
        class: String::from_utf8_lossy(class).into_owned(),
    })
}

/// What the engine needs from the display server.
///
/// Queries degrade to `None`/empty on failure. Injection calls return
/// errors so the caller can log them.
pub trait WindowSystem {
    /// The top-level window directly under the pointer, if any.
    fn window_under_pointer(&self) -> Option<WindowId>;

    /// The desktop root window.
    fn root_window(&self) -> WindowId;

    /// Immediate children of `window`, bottom to top.
    fn children_of(&self, window: WindowId) -> Vec<WindowId>;

    /// The window's `WM_CLASS`, or `None` if unreadable.
    fn class_identity(&self, window: WindowId) -> Option<ClassHint>;

    fn set_focus(&self, window: WindowId) -> Result<()>;

    /// Inject a key press or release.
    fn send_key(&self, keycode: u8, pressed: bool, target: WindowId) -> Result<()>;

    /// Inject a button press or release at `(x, y)` relative to `target`.
    fn send_button(&self, button: u8, pressed: bool, target: WindowId, x: i32, y: i32)
    -> Result<()>;

    /// Pointer position relative to `target`.
    fn pointer_position(&self, target: WindowId) -> Option<(i32, i32)>;

    /// Keyboard modifiers physically held right now.
    fn keyboard_modifiers_held(&self) -> Modifiers;

    /// Physical keycode for `key` in the current keyboard mapping.
    fn resolve_keycode(&self, key: Key) -> Option<u8>;

    /// Push buffered requests to the server.
    fn flush(&self);

    /// File descriptor that becomes readable on server traffic.
    fn connection_fd(&self) -> Option<RawFd> {
        None
    }

    /// Discard pending server events.
    fn drain_events(&self) {}
}

/// A window resolved under the pointer for one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWindow {
    pub id: WindowId,
    pub instance: String,
    pub class: String,
    /// False when `WM_CLASS` could not be read. Per-window rules are
    /// skipped for such targets.
    pub valid: bool,
}

impl TargetWindow {
    /// The identity to use for rule lookups, if known.
    pub fn identity(&self) -> Option<(&str, &str)> {
        self.valid
            .then_some((self.instance.as_str(), self.class.as_str()))
    }
}

/// Resolve the window that should receive a synthesized action.
///
/// The pointer window's first child is preferred, since toolkits often
/// put the interactive surface one level below the frame.
pub fn resolve_target<W: WindowSystem + ?Sized>(ws: &W) -> Option<TargetWindow> {
    let window = ws.window_under_pointer()?;
    if window == ws.root_window() {
        debug!("pointer is over the root window");
        return None;
    }

    let candidate = match ws.children_of(window).first() {
        Some(child) => *child,
        None => {
            debug!("no child windows for {window}, using it as target");
            window
        }
    };

    let target = match ws.class_identity(candidate) {
        Some(hint) => TargetWindow {
            id: candidate,
            instance: hint.instance,
            class: hint.class,
            valid: true,
        },
        None => TargetWindow {
            id: candidate,
            instance: String::new(),
            class: String::new(),
            valid: false,
        },
    };
    debug!(
        "target window {} (instance={:?}, class={:?}, valid={})",
        target.id, target.instance, target.class, target.valid
    );
    Some(target)
}
