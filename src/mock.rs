//! In-memory collaborators for tests.
//!
//! Every fake records what it was asked to do so assertions can inspect
//! exactly which calls were made and in what order. Scripted answers
//! (pointer window, class hints, held modifiers) are set through the
//! `set_*` methods, which take `&self` so a fake can be reconfigured while
//! an engine borrows it.
//!
//! ```ignore
//! let mut engine = Engine::new(MockWindowSystem::with_target("xterm", "XTerm"), rules);
//! engine.process(&RawEvent::key(BTN_RIGHT, 1));
//! engine.process(&RawEvent::key(BTN_RIGHT, 0));
//! assert_eq!(engine.window_system().clicks().len(), 1);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::os::fd::RawFd;
use std::sync::{Mutex, MutexGuard};

use crate::action::{Action, BindingKey, Modifiers};
use crate::button::{LogicalButton, RawEvent};
use crate::error::{Error, Result};
use crate::keycode::Key;
use crate::rules::{RuleStore, Rules};
use crate::runloop::{InputSource, OutputSink};
use crate::window::{ClassHint, WindowId, WindowSystem};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One request made to [`MockWindowSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsCall {
    Focus(WindowId),
    Key {
        keycode: u8,
        pressed: bool,
        target: WindowId,
    },
    Button {
        button: u8,
        pressed: bool,
        target: WindowId,
        x: i32,
        y: i32,
    },
    Flush,
}

/// A scriptable window system that records every injection.
pub struct MockWindowSystem {
    pointer_window: Mutex<Option<WindowId>>,
    children: Mutex<HashMap<WindowId, Vec<WindowId>>>,
    classes: Mutex<HashMap<WindowId, ClassHint>>,
    pointer_position: Mutex<Option<(i32, i32)>>,
    modifiers_held: Mutex<Modifiers>,
    unmapped: Mutex<HashSet<Key>>,
    failing_keycode: Mutex<Option<u8>>,
    failing_button: Mutex<Option<u8>>,
    /// Every injection and flush, in order.
    pub calls: Mutex<Vec<WsCall>>,
}

impl Default for MockWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWindowSystem {
    pub const ROOT: WindowId = WindowId(0x1);
    /// Window placed under the pointer by [`MockWindowSystem::with_target`].
    pub const TARGET: WindowId = WindowId(0x40_0001);

    /// No window under the pointer, pointer at (10, 20).
    pub fn new() -> Self {
        Self {
            pointer_window: Mutex::new(None),
            children: Mutex::new(HashMap::new()),
            classes: Mutex::new(HashMap::new()),
            pointer_position: Mutex::new(Some((10, 20))),
            modifiers_held: Mutex::new(Modifiers::empty()),
            unmapped: Mutex::new(HashSet::new()),
            failing_keycode: Mutex::new(None),
            failing_button: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A childless [`MockWindowSystem::TARGET`] with the given class under the pointer.
    pub fn with_target(instance: &str, class: &str) -> Self {
        let ws = Self::new();
        ws.set_pointer_window(Some(Self::TARGET));
        ws.set_class(Self::TARGET, instance, class);
        ws
    }

    pub fn set_pointer_window(&self, window: Option<WindowId>) {
        *lock(&self.pointer_window) = window;
    }

    pub fn set_children(&self, window: WindowId, children: Vec<WindowId>) {
        lock(&self.children).insert(window, children);
    }

    pub fn set_class(&self, window: WindowId, instance: &str, class: &str) {
        lock(&self.classes).insert(window, ClassHint::new(instance, class));
    }

    pub fn set_pointer_position(&self, position: Option<(i32, i32)>) {
        *lock(&self.pointer_position) = position;
    }

    pub fn set_modifiers_held(&self, modifiers: Modifiers) {
        *lock(&self.modifiers_held) = modifiers;
    }

    /// Make `key` unresolvable in the keyboard mapping.
    pub fn unmap_key(&self, key: Key) {
        lock(&self.unmapped).insert(key);
    }

    /// Make pressing `keycode` fail.
    pub fn fail_key_press(&self, keycode: u8) {
        *lock(&self.failing_keycode) = Some(keycode);
    }

    /// Make pressing pointer `button` fail.
    pub fn fail_button_press(&self, button: u8) {
        *lock(&self.failing_button) = Some(button);
    }

    /// The keycode this fake reports for `key`.
    pub fn keycode_of(key: Key) -> u8 {
        match key {
            Key::ControlLeft => 37,
            Key::ShiftLeft => 50,
            Key::AltLeft => 64,
            Key::MetaLeft => 133,
            other => (other.keysym() % 90) as u8 + 150,
        }
    }

    pub fn calls(&self) -> Vec<WsCall> {
        lock(&self.calls).clone()
    }

    /// Key injections as `(keycode, pressed)`.
    pub fn key_events(&self) -> Vec<(u8, bool)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                WsCall::Key {
                    keycode, pressed, ..
                } => Some((*keycode, *pressed)),
                _ => None,
            })
            .collect()
    }

    /// Button injections as `(button, pressed, x, y)`.
    pub fn clicks(&self) -> Vec<(u8, bool, i32, i32)> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                WsCall::Button {
                    button,
                    pressed,
                    x,
                    y,
                    ..
                } => Some((*button, *pressed, *x, *y)),
                _ => None,
            })
            .collect()
    }

    /// Number of key combinations sent; each one starts with a focus change.
    pub fn combos_sent(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, WsCall::Focus(_)))
            .count()
    }

    /// Keys currently held down by injected presses without a release.
    pub fn keys_still_down(&self) -> Vec<u8> {
        let mut down: Vec<u8> = Vec::new();
        for (keycode, pressed) in self.key_events() {
            if pressed {
                down.push(keycode);
            } else {
                down.retain(|k| *k != keycode);
            }
        }
        down
    }

    fn record(&self, call: WsCall) {
        lock(&self.calls).push(call);
    }
}

impl WindowSystem for MockWindowSystem {
    fn window_under_pointer(&self) -> Option<WindowId> {
        *lock(&self.pointer_window)
    }

    fn root_window(&self) -> WindowId {
        Self::ROOT
    }

    fn children_of(&self, window: WindowId) -> Vec<WindowId> {
        lock(&self.children)
            .get(&window)
            .cloned()
            .unwrap_or_default()
    }

    fn class_identity(&self, window: WindowId) -> Option<ClassHint> {
        lock(&self.classes).get(&window).cloned()
    }

    fn set_focus(&self, window: WindowId) -> Result<()> {
        self.record(WsCall::Focus(window));
        Ok(())
    }

    fn send_key(&self, keycode: u8, pressed: bool, target: WindowId) -> Result<()> {
        if pressed && *lock(&self.failing_keycode) == Some(keycode) {
            return Err(Error::Simulate(format!("mock failure on keycode {keycode}")));
        }
        self.record(WsCall::Key {
            keycode,
            pressed,
            target,
        });
        Ok(())
    }

    fn send_button(
        &self,
        button: u8,
        pressed: bool,
        target: WindowId,
        x: i32,
        y: i32,
    ) -> Result<()> {
        if pressed && *lock(&self.failing_button) == Some(button) {
            return Err(Error::Simulate(format!("mock failure on button {button}")));
        }
        self.record(WsCall::Button {
            button,
            pressed,
            target,
            x,
            y,
        });
        Ok(())
    }

    fn pointer_position(&self, _target: WindowId) -> Option<(i32, i32)> {
        *lock(&self.pointer_position)
    }

    fn keyboard_modifiers_held(&self) -> Modifiers {
        *lock(&self.modifiers_held)
    }

    fn resolve_keycode(&self, key: Key) -> Option<u8> {
        if lock(&self.unmapped).contains(&key) {
            None
        } else {
            Some(Self::keycode_of(key))
        }
    }

    fn flush(&self) {
        self.record(WsCall::Flush);
    }
}

/// A [`RuleStore`] that records every query made against it.
#[derive(Default)]
pub struct RecordingRules {
    pub inner: Rules,
    /// Binding keys passed to either lookup.
    pub lookups: Mutex<Vec<BindingKey>>,
    /// Buttons passed to `is_blacklisted`.
    pub blacklist_checks: Mutex<Vec<LogicalButton>>,
}

impl RecordingRules {
    pub fn new(inner: Rules) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> Vec<BindingKey> {
        lock(&self.lookups).clone()
    }
}

impl RuleStore for RecordingRules {
    fn lookup_global(&self, key: BindingKey) -> Option<Action> {
        lock(&self.lookups).push(key);
        self.inner.lookup_global(key)
    }

    fn lookup_for_window(&self, instance: &str, class: &str, key: BindingKey) -> Option<Action> {
        lock(&self.lookups).push(key);
        self.inner.lookup_for_window(instance, class, key)
    }

    fn is_blacklisted(&self, instance: &str, class: &str, button: LogicalButton) -> bool {
        lock(&self.blacklist_checks).push(button);
        self.inner.is_blacklisted(instance, class, button)
    }
}

/// Output sink that keeps every forwarded event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RawEvent>,
    /// When `true`, every forward fails.
    pub should_fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for RecordingSink {
    fn forward(&mut self, event: &RawEvent) -> Result<()> {
        if self.should_fail {
            return Err(Error::Io(io::Error::other("mock sink failure")));
        }
        self.events.push(*event);
        Ok(())
    }
}

/// Input source that replays queued batches, then reports `WouldBlock`.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    batches: VecDeque<io::Result<Vec<RawEvent>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&mut self, events: Vec<RawEvent>) {
        self.batches.push_back(Ok(events));
    }

    pub fn push_error(&mut self, kind: io::ErrorKind) {
        self.batches.push_back(Err(io::Error::from(kind)));
    }

    pub fn is_exhausted(&self) -> bool {
        self.batches.is_empty()
    }
}

impl InputSource for ScriptedSource {
    fn raw_fd(&self) -> RawFd {
        -1
    }

    fn read_batch(&mut self) -> io::Result<Vec<RawEvent>> {
        self.batches
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::WouldBlock)))
    }
}
