//! Rule file loading.
//!
//! The format is line oriented:
//!
//! ```text
//! # comment
//! RButton = Ctrl+W
//! RButton & LButton = Ctrl+C
//! device_blacklist = Touchpad, Virtual
//! window [class=firefox, instance=Navigator] {
//!     blacklist = BButton
//!     RButton & ScrollDown = Ctrl+Tab
//! }
//! ```
//!
//! Bad lines are logged and skipped; only failing to read the file is an
//! error.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::action::{Action, BindingKey};
use crate::button::LogicalButton;
use crate::error::{Error, Result};
use crate::rules::{Binding, Rules, WindowRule};

const APP_DIR: &str = "eeka";
const FILE_NAME: &str = "config";
const DEFAULT_DATA_DIRS: &str = "/usr/local/share:/usr/share";
const SYSTEM_PATH: &str = "/etc/eeka/config";

/// Read and parse a rule file.
pub fn load(path: &Path) -> Result<Rules> {
    let text = fs::read_to_string(path)?;
    info!("Reading configuration from {}", path.display());
    let rules = parse(&text);
    if rules.is_empty() {
        warn!("No valid bindings defined in {}", path.display());
    }
    Ok(rules)
}

/// Parse rule file contents.
pub fn parse(text: &str) -> Rules {
    let mut rules = Rules::new();
    let mut block: Option<Block> = None;

    for (line_no, line) in logical_lines(text) {
        if let Some(open) = block.take() {
            if line.starts_with('}') {
                if let Block::Rule(rule) = open {
                    debug!(
                        "window rule instance={:?} class={:?}: {} bindings, {} blacklisted",
                        rule.instance,
                        rule.class,
                        rule.bindings.len(),
                        rule.blacklist.len()
                    );
                    rules.add_window_rule(rule);
                }
                continue;
            }
            block = Some(match open {
                Block::Rule(mut rule) => {
                    parse_rule_line(&mut rule, line_no, &line);
                    Block::Rule(rule)
                }
                Block::Skipped => Block::Skipped,
            });
            continue;
        }

        if is_window_header(&line) {
            block = Some(match parse_window_header(&line) {
                Ok(rule) => Block::Rule(rule),
                Err(message) => {
                    report(line_no, message);
                    Block::Skipped
                }
            });
            continue;
        }

        if let Some(("device_blacklist", value)) = split_assignment(&line) {
            for name in list_items(value) {
                debug!("device blacklist: {name}");
                rules.device_blacklist.push(name.to_string());
            }
            continue;
        }

        match parse_binding(&line) {
            Ok(binding) => {
                debug!("binding: {} = {}", binding.key, binding.action);
                rules.bindings.push(binding);
            }
            Err(message) => report(line_no, message),
        }
    }

    match block {
        Some(Block::Rule(rule)) => {
            warn!("missing closing brace for window rule at end of file");
            rules.add_window_rule(rule);
        }
        Some(Block::Skipped) => warn!("missing closing brace at end of file"),
        None => {}
    }

    rules
}

enum Block {
    Rule(WindowRule),
    Skipped,
}

fn report(line: usize, message: String) {
    warn!("{}", Error::Config { line, message });
}

/// Comment-stripped, trimmed, non-empty lines with `\` continuations joined.
/// Each carries the 1-based number of its first physical line.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let content = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let content = content.trim();
        let (content, continues) = match content.strip_suffix('\\') {
            Some(rest) => (rest.trim_end(), true),
            None => (content, false),
        };

        let (start, mut joined) = pending.take().unwrap_or((idx + 1, String::new()));
        if !content.is_empty() {
            if !joined.is_empty() {
                joined.push(' ');
            }
            joined.push_str(content);
        }

        if continues {
            pending = Some((start, joined));
        } else if !joined.is_empty() {
            out.push((start, joined));
        }
    }
    if let Some((start, joined)) = pending
        && !joined.is_empty()
    {
        out.push((start, joined));
    }
    out
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    line.split_once('=').map(|(k, v)| (k.trim(), v.trim()))
}

fn list_items(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

fn is_window_header(line: &str) -> bool {
    line.strip_prefix("window")
        .is_some_and(|rest| rest.starts_with(|c: char| c == '[' || c.is_whitespace()))
}

fn parse_window_header(line: &str) -> std::result::Result<WindowRule, String> {
    let open = line
        .find('[')
        .ok_or_else(|| format!("missing criteria for window rule: {line}"))?;
    let close = line[open..]
        .find(']')
        .map(|pos| open + pos)
        .ok_or_else(|| format!("missing closing bracket in window rule: {line}"))?;

    let mut rule = WindowRule::default();
    for criterion in line[open + 1..close].split(',') {
        let criterion = criterion.trim();
        if criterion.is_empty() {
            continue;
        }
        match split_assignment(criterion) {
            Some(("instance", value)) => rule.instance = value.to_string(),
            Some(("class", value)) => rule.class = value.to_string(),
            _ => return Err(format!("unknown window criterion: {criterion}")),
        }
    }

    if rule.instance.is_empty() && rule.class.is_empty() {
        return Err(format!("window rule missing criteria: {line}"));
    }
    Ok(rule)
}

fn parse_rule_line(rule: &mut WindowRule, line_no: usize, line: &str) {
    if let Some(("blacklist", value)) = split_assignment(line) {
        for name in list_items(value) {
            match name.parse::<LogicalButton>() {
                Ok(button) => {
                    if !rule.blacklist.contains(&button) {
                        rule.blacklist.push(button);
                    }
                }
                Err(message) => report(line_no, message),
            }
        }
        return;
    }
    match parse_binding(line) {
        Ok(binding) => rule.bindings.push(binding),
        Err(message) => report(line_no, message),
    }
}

fn parse_binding(line: &str) -> std::result::Result<Binding, String> {
    let (lhs, rhs) = line
        .split_once('=')
        .ok_or_else(|| format!("invalid binding format: {line}"))?;

    let mut buttons = lhs.split('&').map(str::trim);
    let first: LogicalButton = buttons
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing button in: {line}"))?
        .parse()?;
    let second = match buttons.next() {
        Some(name) => Some(name.parse::<LogicalButton>()?),
        None => None,
    };
    if buttons.next().is_some() {
        return Err(format!("more than two buttons in: {line}"));
    }

    let action: Action = rhs.trim().parse()?;
    Ok(Binding {
        key: BindingKey { first, second },
        action,
    })
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Locations searched for a rule file, in order.
pub fn candidate_paths() -> Vec<PathBuf> {
    candidates_from(dirs::config_dir(), std::env::var("XDG_DATA_DIRS").ok())
}

fn candidates_from(config_dir: Option<PathBuf>, data_dirs: Option<String>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = config_dir {
        paths.push(dir.join(APP_DIR).join(FILE_NAME));
    }
    let data_dirs = data_dirs
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_DATA_DIRS.to_string());
    for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
        paths.push(Path::new(dir).join(APP_DIR).join(FILE_NAME));
    }
    paths.push(PathBuf::from(SYSTEM_PATH));
    paths
}

/// Load rules from `explicit` if given, otherwise from the first existing
/// default location. With no file anywhere the rule set is empty.
pub fn load_or_default(explicit: Option<&Path>) -> Result<Rules> {
    if let Some(path) = explicit {
        return load(&expand_tilde(path));
    }
    let candidates = candidate_paths();
    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => load(path),
        None => {
            let shown = candidates
                .first()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            info!("No configuration found (expected {shown}), starting without bindings");
            Ok(Rules::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Modifiers;
    use crate::keycode::Key;
    use crate::rules::RuleStore;
    use std::io::Write;

    const SAMPLE: &str = "\
# global bindings
RButton = Ctrl+W
RButton & LButton = Ctrl+C   # copy
BButton & ScrollUp = Ctrl+Shift+Tab
device_blacklist = Virtual, Touchpad

window [class=firefox, instance=Navigator] {
    blacklist = RButton, BButton
    RButton & ScrollDown = Ctrl+Tab
}
";

    #[test]
    fn test_parse_globals() {
        let rules = parse(SAMPLE);
        assert_eq!(rules.bindings.len(), 3);
        assert_eq!(
            rules.lookup_global(BindingKey::standalone(LogicalButton::Right)),
            Some(Action::new(Modifiers::CTRL, Key::KeyW))
        );
        assert_eq!(
            rules.lookup_global(BindingKey::chord(LogicalButton::Right, LogicalButton::Left)),
            Some(Action::new(Modifiers::CTRL, Key::KeyC))
        );
        assert_eq!(
            rules.lookup_global(BindingKey::chord(LogicalButton::Back, LogicalButton::ScrollUp)),
            Some(Action::new(Modifiers::CTRL | Modifiers::SHIFT, Key::Tab))
        );
        assert_eq!(rules.device_blacklist, vec!["Virtual", "Touchpad"]);
    }

    #[test]
    fn test_parse_window_rule() {
        let rules = parse(SAMPLE);
        assert_eq!(rules.window_rules.len(), 1);
        let rule = &rules.window_rules[0];
        assert_eq!(rule.instance, "Navigator");
        assert_eq!(rule.class, "firefox");
        assert_eq!(rule.blacklist, vec![LogicalButton::Right, LogicalButton::Back]);
        assert_eq!(rule.bindings.len(), 1);
        assert!(rules.is_blacklisted("Navigator", "firefox", LogicalButton::Back));
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let rules = parse(
            "XButton = Ctrl+C\n\
             RButton = Ctrl+Nope\n\
             RButton & MButton & LButton = A\n\
             no equals sign here\n\
             MButton = Ctrl+V\n",
        );
        assert_eq!(rules.bindings.len(), 1);
        assert_eq!(rules.bindings[0].key, BindingKey::standalone(LogicalButton::Middle));
    }

    #[test]
    fn test_invalid_window_header_skips_block() {
        let rules = parse(
            "window [] {\n\
             RButton = Ctrl+W\n\
             }\n\
             MButton = Ctrl+V\n",
        );
        assert!(rules.window_rules.is_empty());
        assert_eq!(rules.bindings.len(), 1);
        assert_eq!(rules.bindings[0].key.first, LogicalButton::Middle);
    }

    #[test]
    fn test_unterminated_window_rule_is_kept() {
        let rules = parse("window [class=XTerm] {\nblacklist = RButton\n");
        assert_eq!(rules.window_rules.len(), 1);
        assert_eq!(rules.window_rules[0].class, "XTerm");
        assert!(rules.window_rules[0].instance.is_empty());
    }

    #[test]
    fn test_line_continuation() {
        let rules = parse("RButton & \\\n  ScrollUp = Alt+Left\n");
        assert_eq!(
            rules.lookup_global(BindingKey::chord(LogicalButton::Right, LogicalButton::ScrollUp)),
            Some(Action::new(Modifiers::ALT, Key::ArrowLeft))
        );
    }

    #[test]
    fn test_logical_line_numbers() {
        let lines = logical_lines("# c\n\nA = B \\\n C\nD = E\n");
        assert_eq!(
            lines,
            vec![(3, "A = B C".to_string()), (5, "D = E".to_string())]
        );
    }

    #[test]
    fn test_button_number_names() {
        let rules = parse("Button9 & Button5 = Ctrl+PageDown\n");
        assert_eq!(
            rules.bindings[0].key,
            BindingKey::chord(LogicalButton::Forward, LogicalButton::ScrollDown)
        );
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let rules = load(file.path()).unwrap();
        assert_eq!(rules.bindings.len(), 3);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_load_or_default_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules");
        fs::write(&path, "FButton = Alt+Right\n").unwrap();
        let rules = load_or_default(Some(&path)).unwrap();
        assert_eq!(rules.bindings.len(), 1);
    }

    #[test]
    fn test_candidate_order() {
        let paths = candidates_from(
            Some(PathBuf::from("/home/u/.config")),
            Some("/opt/share:/usr/share".to_string()),
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/home/u/.config/eeka/config"),
                PathBuf::from("/opt/share/eeka/config"),
                PathBuf::from("/usr/share/eeka/config"),
                PathBuf::from("/etc/eeka/config"),
            ]
        );

        let paths = candidates_from(None, None);
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], PathBuf::from("/usr/local/share/eeka/config"));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/etc/x")), PathBuf::from("/etc/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/rules")), home.join("rules"));
        }
    }
}
