//! The chord state machine.
//!
//! [`Engine::process`] takes one raw event at a time and says whether it
//! should reach the virtual device. Along the way it may inject a key
//! combination or replay a suppressed click through the window system.
//!
//! Right, back and forward are *modifier-capable*: pressing one arms it
//! and holds its native click back. Releasing it alone either triggers
//! its standalone binding or replays the click. Left arms only
//! tentatively; its press always reaches applications so dragging and
//! selecting keep working.

use log::{debug, warn};

use crate::action::BindingKey;
use crate::button::{ButtonSet, Classified, LogicalButton, RawEvent, Transition, classify};
use crate::dispatch::{Dispatcher, Timing};
use crate::rules::RuleStore;
use crate::window::{TargetWindow, WindowSystem, resolve_target};

/// What to do with the raw event that was just processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Write it to the virtual device unchanged.
    Forward,
    /// Drop it.
    Block,
}

/// Mutable chord tracking.
///
/// `combo_used` only means something while a modifier is armed. A button
/// is never in both `blocked` and `blacklisted` at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChordState {
    modifier: Option<LogicalButton>,
    combo_used: bool,
    blocked: ButtonSet,
    blacklisted: ButtonSet,
}

impl ChordState {
    /// The armed chord modifier, if any.
    pub fn modifier(&self) -> Option<LogicalButton> {
        self.modifier
    }

    pub fn combo_used(&self) -> bool {
        self.combo_used
    }

    /// Buttons whose native events are currently suppressed.
    pub fn blocked(&self) -> ButtonSet {
        self.blocked
    }

    /// Buttons passing straight through because their window blacklists them.
    pub fn blacklisted(&self) -> ButtonSet {
        self.blacklisted
    }

    pub fn is_idle(&self) -> bool {
        self.modifier.is_none() && self.blocked.is_empty() && self.blacklisted.is_empty()
    }

    fn arm(&mut self, button: LogicalButton, block: bool) {
        self.modifier = Some(button);
        self.combo_used = false;
        if block {
            self.blocked.insert(button);
        }
    }

    fn disarm(&mut self) {
        self.modifier = None;
        self.combo_used = false;
    }

    fn is_tracking(&self, button: LogicalButton) -> bool {
        self.modifier == Some(button)
            || self.blocked.contains(button)
            || self.blacklisted.contains(button)
    }
}

/// Owns the chord state and its collaborators.
pub struct Engine<W, R> {
    ws: W,
    rules: R,
    state: ChordState,
    dispatcher: Dispatcher,
    dispatching: bool,
}

impl<W: WindowSystem, R: RuleStore> Engine<W, R> {
    pub fn new(ws: W, rules: R) -> Self {
        Self::with_timing(ws, rules, Timing::default())
    }

    pub fn with_timing(ws: W, rules: R, timing: Timing) -> Self {
        Self {
            ws,
            rules,
            state: ChordState::default(),
            dispatcher: Dispatcher::new(timing),
            dispatching: false,
        }
    }

    pub fn state(&self) -> &ChordState {
        &self.state
    }

    pub fn window_system(&self) -> &W {
        &self.ws
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    /// True while a synthesized sequence is being injected.
    ///
    /// Injection is synchronous on the dispatch thread, so no raw event can
    /// be read while this is set. The flag only guards a caller that feeds
    /// events in from a window-system callback.
    pub fn is_dispatching(&self) -> bool {
        self.dispatching
    }

    /// Decide the fate of one raw event.
    pub fn process(&mut self, event: &RawEvent) -> Verdict {
        match classify(event) {
            Classified::Passthrough => Verdict::Forward,
            Classified::Button(button, Transition::Press) => self.on_press(button),
            Classified::Button(button, Transition::Release) => self.on_release(button),
            Classified::Scroll(direction) => self.on_scroll(direction),
        }
    }

    fn keyboard_modifier_held(&self) -> bool {
        let held = self.ws.keyboard_modifiers_held();
        if !held.is_empty() {
            debug!("keyboard modifiers {held:?} held, passing through");
        }
        !held.is_empty()
    }

    fn on_press(&mut self, button: LogicalButton) -> Verdict {
        debug!("{button} pressed");
        if button.is_chord_tracked() && self.keyboard_modifier_held() {
            return Verdict::Forward;
        }

        if !button.is_modifier_capable() {
            match self.state.modifier {
                None if button == LogicalButton::Left => {
                    self.state.arm(button, false);
                    debug!("{button} armed as tentative modifier");
                }
                Some(modifier) if modifier != button => {
                    self.chord(modifier, button);
                }
                _ => {}
            }
            return Verdict::Forward;
        }

        let target = resolve_target(&self.ws);
        // A button still held back from an earlier press stays in chord logic.
        if !self.state.blocked.contains(button)
            && let Some((instance, class)) = target.as_ref().and_then(TargetWindow::identity)
            && self.rules.is_blacklisted(instance, class, button)
        {
            debug!("{button} blacklisted for {instance}/{class}, passing through");
            self.state.blacklisted.insert(button);
            return Verdict::Forward;
        }

        match self.state.modifier {
            None if target.is_none() => {
                debug!("no target window, not arming {button}");
                Verdict::Forward
            }
            None => {
                self.state.arm(button, true);
                debug!("{button} armed, holding back its click");
                Verdict::Block
            }
            Some(modifier) if modifier != button => {
                self.chord(modifier, button);
                self.state.blocked.insert(button);
                Verdict::Block
            }
            Some(_) => {
                // Stale hold whose release was let through while disabled.
                self.state.arm(button, true);
                debug!("{button} pressed again while armed, holding back its click");
                Verdict::Block
            }
        }
    }

    fn on_release(&mut self, button: LogicalButton) -> Verdict {
        debug!("{button} released");
        if !self.state.is_tracking(button) {
            return Verdict::Forward;
        }

        if self.state.blacklisted.remove(button) {
            debug!("{button} release passes through (blacklisted)");
            return Verdict::Forward;
        }

        let is_modifier = self.state.modifier == Some(button);
        if is_modifier && self.state.blocked.contains(button) {
            if button != LogicalButton::Left && !self.state.combo_used {
                if self.handle_binding(BindingKey::standalone(button)) {
                    debug!("{button} used standalone binding");
                } else {
                    self.replay(button);
                }
            }
            self.state.blocked.remove(button);
            self.state.disarm();
            return Verdict::Block;
        }

        if self.state.blocked.remove(button) {
            debug!("{button} release swallowed");
            return Verdict::Block;
        }

        if is_modifier {
            self.state.disarm();
        }
        Verdict::Forward
    }

    fn on_scroll(&mut self, direction: LogicalButton) -> Verdict {
        if self.keyboard_modifier_held() {
            return Verdict::Forward;
        }

        match self.state.modifier {
            Some(modifier) => {
                let found = self.chord(modifier, direction);
                if modifier == LogicalButton::Left && !found {
                    Verdict::Forward
                } else {
                    Verdict::Block
                }
            }
            None => {
                if self.handle_binding(BindingKey::standalone(direction)) {
                    Verdict::Block
                } else {
                    Verdict::Forward
                }
            }
        }
    }

    fn chord(&mut self, modifier: LogicalButton, second: LogicalButton) -> bool {
        debug!("chord {modifier} + {second}");
        let found = self.handle_binding(BindingKey::chord(modifier, second));
        if found {
            self.state.combo_used = true;
        }
        found
    }

    /// Look up and send the binding for `key`. Returns whether one was found,
    /// even if sending it failed.
    fn handle_binding(&mut self, key: BindingKey) -> bool {
        let target = resolve_target(&self.ws);
        let action = match target.as_ref().and_then(TargetWindow::identity) {
            Some((instance, class)) => self.rules.lookup_for_window(instance, class, key),
            None => self.rules.lookup_global(key),
        };
        let Some(action) = action else {
            debug!("no binding for {key}");
            return false;
        };

        debug!("{key} bound to {action}");
        match target {
            Some(target) => {
                self.dispatching = true;
                if let Err(e) = self.dispatcher.send_combo(&self.ws, &action, target.id) {
                    warn!("failed to send {action}: {e}");
                }
                self.dispatching = false;
            }
            None => debug!("no target window for {action}"),
        }
        true
    }

    fn replay(&mut self, button: LogicalButton) {
        let Some(target) = resolve_target(&self.ws) else {
            debug!("no target window, {button} click is lost");
            return;
        };
        self.dispatching = true;
        if let Err(e) = self.dispatcher.replay_click(&self.ws, button, target.id) {
            warn!("failed to replay {button} click: {e}");
        }
        self.dispatching = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Modifiers};
    use crate::button::{BTN_EXTRA, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE};
    use crate::keycode::Key;
    use crate::mock::{MockWindowSystem, RecordingRules};
    use crate::rules::{Binding, Rules, WindowRule};

    type TestEngine = Engine<MockWindowSystem, RecordingRules>;

    fn engine(rules: Rules) -> TestEngine {
        Engine::with_timing(
            MockWindowSystem::with_target("xterm", "XTerm"),
            RecordingRules::new(rules),
            Timing::immediate(),
        )
    }

    fn press(code: u16) -> RawEvent {
        RawEvent::key(code, 1)
    }

    fn release(code: u16) -> RawEvent {
        RawEvent::key(code, 0)
    }

    fn ctrl(key: Key) -> Action {
        Action::new(Modifiers::CTRL, key)
    }

    #[test]
    fn test_right_click_replayed_without_binding() {
        let mut engine = engine(Rules::new());
        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Block);
        assert_eq!(engine.state().modifier(), Some(LogicalButton::Right));
        assert!(engine.state().blocked().contains(LogicalButton::Right));

        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert!(engine.state().is_idle());
        let ws = engine.window_system();
        assert_eq!(ws.clicks(), vec![(3, true, 10, 20), (3, false, 10, 20)]);
        assert_eq!(ws.combos_sent(), 0);
    }

    #[test]
    fn test_standalone_binding() {
        let mut rules = Rules::new();
        rules.bind(BindingKey::standalone(LogicalButton::Back), ctrl(Key::KeyW));
        let mut engine = engine(rules);

        assert_eq!(engine.process(&press(BTN_SIDE)), Verdict::Block);
        assert_eq!(engine.process(&release(BTN_SIDE)), Verdict::Block);
        let ws = engine.window_system();
        assert_eq!(ws.combos_sent(), 1);
        assert!(ws.clicks().is_empty());
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_left_is_tentative_modifier() {
        let mut engine = engine(Rules::new());
        assert_eq!(engine.process(&press(BTN_LEFT)), Verdict::Forward);
        assert_eq!(engine.state().modifier(), Some(LogicalButton::Left));
        assert!(engine.state().blocked().is_empty());

        assert_eq!(engine.process(&release(BTN_LEFT)), Verdict::Forward);
        assert!(engine.state().is_idle());
        assert!(engine.window_system().clicks().is_empty());
    }

    #[test]
    fn test_left_then_right_chord() {
        let mut rules = Rules::new();
        rules.bind(
            BindingKey::chord(LogicalButton::Left, LogicalButton::Right),
            ctrl(Key::KeyC),
        );
        let mut engine = engine(rules);

        assert_eq!(engine.process(&press(BTN_LEFT)), Verdict::Forward);
        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Block);
        assert!(engine.state().combo_used());
        assert_eq!(engine.window_system().combos_sent(), 1);

        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert_eq!(engine.process(&release(BTN_LEFT)), Verdict::Forward);
        assert!(engine.state().is_idle());
        assert_eq!(engine.window_system().combos_sent(), 1);
        assert!(engine.window_system().clicks().is_empty());
    }

    #[test]
    fn test_right_then_left_chord_releases_in_either_order() {
        let mut rules = Rules::new();
        rules.bind(
            BindingKey::chord(LogicalButton::Right, LogicalButton::Left),
            ctrl(Key::KeyV),
        );
        let mut engine = engine(rules);

        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Block);
        assert_eq!(engine.process(&press(BTN_LEFT)), Verdict::Forward);
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert_eq!(engine.state().modifier(), None);
        assert_eq!(engine.process(&release(BTN_LEFT)), Verdict::Forward);

        let ws = engine.window_system();
        assert_eq!(ws.combos_sent(), 1);
        assert!(ws.clicks().is_empty());
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_unbound_chord_still_replays_modifier() {
        let mut engine = engine(Rules::new());
        engine.process(&press(BTN_RIGHT));
        assert_eq!(engine.process(&press(BTN_MIDDLE)), Verdict::Forward);
        assert!(!engine.state().combo_used());
        assert_eq!(engine.process(&release(BTN_MIDDLE)), Verdict::Forward);
        engine.process(&release(BTN_RIGHT));
        assert_eq!(engine.window_system().clicks().len(), 2);
    }

    #[test]
    fn test_second_modifier_capable_press_is_swallowed() {
        let mut rules = Rules::new();
        rules.bind(
            BindingKey::chord(LogicalButton::Right, LogicalButton::Forward),
            ctrl(Key::Tab),
        );
        let mut engine = engine(rules);

        engine.process(&press(BTN_RIGHT));
        assert_eq!(engine.process(&press(BTN_EXTRA)), Verdict::Block);
        assert!(engine.state().blocked().contains(LogicalButton::Forward));
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert_eq!(engine.process(&release(BTN_EXTRA)), Verdict::Block);
        assert!(engine.state().is_idle());
        assert_eq!(engine.window_system().combos_sent(), 1);
    }

    #[test]
    fn test_scroll_with_modifier() {
        let mut rules = Rules::new();
        rules.bind(
            BindingKey::chord(LogicalButton::Right, LogicalButton::ScrollDown),
            ctrl(Key::Tab),
        );
        let mut engine = engine(rules);

        engine.process(&press(BTN_RIGHT));
        assert_eq!(engine.process(&RawEvent::wheel(-1)), Verdict::Block);
        assert_eq!(engine.process(&RawEvent::wheel(-1)), Verdict::Block);
        // unbound direction is still swallowed while right is held
        assert_eq!(engine.process(&RawEvent::wheel(1)), Verdict::Block);
        assert_eq!(engine.state().modifier(), Some(LogicalButton::Right));
        engine.process(&release(BTN_RIGHT));

        let ws = engine.window_system();
        assert_eq!(ws.combos_sent(), 2);
        assert!(ws.clicks().is_empty());
    }

    #[test]
    fn test_scroll_with_left_held() {
        let mut rules = Rules::new();
        rules.bind(
            BindingKey::chord(LogicalButton::Left, LogicalButton::ScrollUp),
            ctrl(Key::Equal),
        );
        let mut engine = engine(rules);

        engine.process(&press(BTN_LEFT));
        assert_eq!(engine.process(&RawEvent::wheel(1)), Verdict::Block);
        assert_eq!(engine.process(&RawEvent::wheel(-1)), Verdict::Forward);
        assert_eq!(engine.window_system().combos_sent(), 1);
    }

    #[test]
    fn test_standalone_scroll() {
        let mut rules = Rules::new();
        rules.bind(BindingKey::standalone(LogicalButton::ScrollUp), ctrl(Key::PageUp));
        let mut engine = engine(rules);

        assert_eq!(engine.process(&RawEvent::wheel(1)), Verdict::Block);
        assert_eq!(engine.process(&RawEvent::wheel(-1)), Verdict::Forward);
        assert_eq!(engine.window_system().combos_sent(), 1);
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_keyboard_modifier_bypass() {
        let mut engine = engine(Rules::new());
        engine.window_system().set_modifiers_held(Modifiers::SHIFT);

        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Forward);
        assert_eq!(engine.process(&RawEvent::wheel(1)), Verdict::Forward);
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Forward);
        assert!(engine.state().is_idle());
        assert!(engine.rules().lookups().is_empty());
        assert!(engine.window_system().calls().is_empty());
    }

    #[test]
    fn test_release_clears_even_with_keyboard_modifier() {
        let mut engine = engine(Rules::new());
        engine.process(&press(BTN_RIGHT));
        engine.window_system().set_modifiers_held(Modifiers::CTRL);
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_blacklisted_window() {
        let mut rules = Rules::new();
        rules.bind(BindingKey::standalone(LogicalButton::Right), ctrl(Key::KeyW));
        let mut rule = WindowRule::new("", "XTerm");
        rule.blacklist.push(LogicalButton::Right);
        rules.add_window_rule(rule);
        let mut engine = engine(rules);

        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Forward);
        assert!(engine.state().blacklisted().contains(LogicalButton::Right));
        assert_eq!(engine.state().modifier(), None);
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Forward);
        assert!(engine.state().is_idle());
        assert!(engine.rules().lookups().is_empty());
        assert!(engine.window_system().calls().is_empty());
    }

    #[test]
    fn test_window_rule_overrides_global() {
        let mut rules = Rules::new();
        rules.bind(BindingKey::standalone(LogicalButton::Right), ctrl(Key::KeyW));
        let mut rule = WindowRule::new("xterm", "");
        rule.bindings.push(Binding {
            key: BindingKey::standalone(LogicalButton::Right),
            action: ctrl(Key::KeyT),
        });
        rules.add_window_rule(rule);
        let mut engine = engine(rules);

        engine.process(&press(BTN_RIGHT));
        engine.process(&release(BTN_RIGHT));
        let t = MockWindowSystem::keycode_of(Key::KeyT);
        assert!(engine.window_system().key_events().contains(&(t, true)));
    }

    #[test]
    fn test_no_target_forwards_press() {
        let mut engine = engine(Rules::new());
        engine.window_system().set_pointer_window(None);

        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Forward);
        assert!(engine.state().is_idle());
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Forward);
        assert!(engine.window_system().clicks().is_empty());
    }

    #[test]
    fn test_unresolvable_key_still_clears_state() {
        let mut rules = Rules::new();
        rules.bind(BindingKey::standalone(LogicalButton::Right), ctrl(Key::F20));
        let mut engine = engine(rules);
        engine.window_system().unmap_key(Key::F20);

        engine.process(&press(BTN_RIGHT));
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert!(engine.state().is_idle());
        assert!(!engine.is_dispatching());
        assert!(engine.window_system().key_events().is_empty());
        // the binding existed, so no click replay either
        assert!(engine.window_system().clicks().is_empty());
    }

    #[test]
    fn test_invalid_class_uses_global_rules() {
        let mut rules = Rules::new();
        rules.bind(BindingKey::standalone(LogicalButton::Forward), ctrl(Key::KeyR));
        let mut engine = engine(rules);
        let ws = engine.window_system();
        let bare = crate::window::WindowId(0x77);
        ws.set_pointer_window(Some(bare));

        engine.process(&press(BTN_EXTRA));
        engine.process(&release(BTN_EXTRA));
        assert_eq!(engine.window_system().combos_sent(), 1);
        assert!(engine.rules().blacklist_checks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_passthrough_events() {
        let mut engine = engine(Rules::new());
        engine.process(&press(BTN_RIGHT));
        assert_eq!(engine.process(&RawEvent::new(crate::button::EV_REL, 0, 3)), Verdict::Forward);
        assert_eq!(engine.process(&RawEvent::syn()), Verdict::Forward);
        assert_eq!(engine.process(&RawEvent::key(BTN_RIGHT, 2)), Verdict::Forward);
        assert_eq!(engine.state().modifier(), Some(LogicalButton::Right));
    }

    #[test]
    fn test_repress_of_armed_button_is_held_back() {
        let mut engine = engine(Rules::new());
        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Block);
        // the release never reached the engine

        assert_eq!(engine.process(&press(BTN_RIGHT)), Verdict::Block);
        assert!(!engine.state().combo_used());
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert!(engine.state().is_idle());
        assert_eq!(
            engine.window_system().clicks(),
            vec![(3, true, 10, 20), (3, false, 10, 20)]
        );
    }

    #[test]
    fn test_repress_of_armed_button_skips_blacklist() {
        let mut rules = Rules::new();
        let mut rule = WindowRule::new("", "Gimp");
        rule.blacklist.push(LogicalButton::Back);
        rules.add_window_rule(rule);
        let mut engine = engine(rules);

        engine.process(&press(BTN_SIDE));
        engine
            .window_system()
            .set_class(MockWindowSystem::TARGET, "gimp", "Gimp");

        assert_eq!(engine.process(&press(BTN_SIDE)), Verdict::Block);
        assert!(engine.state().blacklisted().is_empty());
        assert!(engine.state().blocked().contains(LogicalButton::Back));
        assert_eq!(engine.process(&release(BTN_SIDE)), Verdict::Block);
        assert!(engine.state().is_idle());
    }

    #[test]
    fn test_middle_chord_ignores_keyboard_modifier() {
        let mut rules = Rules::new();
        rules.bind(
            BindingKey::chord(LogicalButton::Right, LogicalButton::Middle),
            ctrl(Key::KeyN),
        );
        let mut engine = engine(rules);

        engine.process(&press(BTN_RIGHT));
        engine.window_system().set_modifiers_held(Modifiers::ALT);
        assert_eq!(engine.process(&press(BTN_MIDDLE)), Verdict::Forward);
        assert!(engine.state().combo_used());
        assert_eq!(engine.window_system().combos_sent(), 1);

        assert_eq!(engine.process(&release(BTN_MIDDLE)), Verdict::Forward);
        assert_eq!(engine.process(&release(BTN_RIGHT)), Verdict::Block);
        assert!(engine.window_system().clicks().is_empty());
        assert!(engine.state().is_idle());
    }
}
