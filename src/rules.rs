//! Binding storage and lookup.

use crate::action::{Action, BindingKey};
use crate::button::LogicalButton;

/// Read-only view of the loaded bindings, as the engine sees it.
pub trait RuleStore {
    /// First global binding for `key`.
    fn lookup_global(&self, key: BindingKey) -> Option<Action>;

    /// First binding for `key` in a window rule matching `instance`/`class`,
    /// falling back to [`RuleStore::lookup_global`].
    fn lookup_for_window(&self, instance: &str, class: &str, key: BindingKey) -> Option<Action>;

    /// Whether a matching window rule blacklists `button`.
    fn is_blacklisted(&self, instance: &str, class: &str, button: LogicalButton) -> bool;
}

/// One `button [& button] = action` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub key: BindingKey,
    pub action: Action,
}

/// Bindings and blacklist scoped to windows with a given identity.
///
/// An empty `instance` or `class` matches any window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowRule {
    pub instance: String,
    pub class: String,
    pub bindings: Vec<Binding>,
    pub blacklist: Vec<LogicalButton>,
}

impl WindowRule {
    pub fn new(instance: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            class: class.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, instance: &str, class: &str) -> bool {
        (self.instance.is_empty() || self.instance == instance)
            && (self.class.is_empty() || self.class == class)
    }

    fn lookup(&self, key: BindingKey) -> Option<Action> {
        self.bindings
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.action)
    }
}

/// The in-memory rule set produced by the config loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rules {
    pub bindings: Vec<Binding>,
    pub window_rules: Vec<WindowRule>,
    /// Substrings of input device names that must never be grabbed.
    pub device_blacklist: Vec<String>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global binding.
    pub fn bind(&mut self, key: BindingKey, action: Action) -> &mut Self {
        self.bindings.push(Binding { key, action });
        self
    }

    pub fn add_window_rule(&mut self, rule: WindowRule) -> &mut Self {
        self.window_rules.push(rule);
        self
    }

    pub fn is_device_blacklisted(&self, device_name: &str) -> bool {
        self.device_blacklist
            .iter()
            .any(|pattern| device_name.contains(pattern.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.window_rules.is_empty()
    }
}

impl RuleStore for Rules {
    fn lookup_global(&self, key: BindingKey) -> Option<Action> {
        self.bindings
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.action)
    }

    fn lookup_for_window(&self, instance: &str, class: &str, key: BindingKey) -> Option<Action> {
        self.window_rules
            .iter()
            .filter(|rule| rule.matches(instance, class))
            .find_map(|rule| rule.lookup(key))
            .or_else(|| self.lookup_global(key))
    }

    fn is_blacklisted(&self, instance: &str, class: &str, button: LogicalButton) -> bool {
        self.window_rules
            .iter()
            .filter(|rule| rule.matches(instance, class))
            .any(|rule| rule.blacklist.contains(&button))
    }
}
