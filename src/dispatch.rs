//! Turning resolved bindings into synthesized input.

use std::iter;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::action::Action;
use crate::button::LogicalButton;
use crate::error::{Error, Result};
use crate::window::{WindowId, WindowSystem};

/// Delays between the steps of a synthesized sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After moving focus, before the first key press.
    pub focus_settle: Duration,
    /// Between pressing and releasing the key combination.
    pub key_hold: Duration,
    /// Between press and release of a replayed click.
    pub click_gap: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            focus_settle: Duration::from_millis(1),
            key_hold: Duration::from_millis(1),
            click_gap: Duration::from_millis(10),
        }
    }
}

impl Timing {
    /// No delays at all.
    pub const fn immediate() -> Self {
        Self {
            focus_settle: Duration::ZERO,
            key_hold: Duration::ZERO,
            click_gap: Duration::ZERO,
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Button index used to replay a suppressed click.
///
/// Left and scroll have no replay path.
pub fn replay_button(button: LogicalButton) -> Option<u8> {
    match button {
        LogicalButton::Right => Some(3),
        LogicalButton::Middle => Some(2),
        LogicalButton::Back => Some(8),
        LogicalButton::Forward => Some(9),
        _ => None,
    }
}

/// Injects key combinations and click replays through a [`WindowSystem`].
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    timing: Timing,
}

impl Dispatcher {
    pub fn new(timing: Timing) -> Self {
        Self { timing }
    }

    /// Focus `target` and type `action` into it.
    ///
    /// Every keycode is resolved before anything is sent, so an unmapped
    /// key leaves the server untouched. If a press fails part way, the
    /// keys already down are released before the error is returned.
    pub fn send_combo<W: WindowSystem + ?Sized>(
        &self,
        ws: &W,
        action: &Action,
        target: WindowId,
    ) -> Result<()> {
        let mut sequence = Vec::with_capacity(5);
        for key in action.modifier_keys().chain(iter::once(action.key)) {
            let keycode = ws.resolve_keycode(key).ok_or(Error::KeyUnresolvable(key))?;
            sequence.push(keycode);
        }

        debug!("sending {action} to {target}");
        ws.set_focus(target)?;
        ws.flush();
        pause(self.timing.focus_settle);

        let mut held = 0;
        let mut failure = None;
        for &keycode in &sequence {
            match ws.send_key(keycode, true, target) {
                Ok(()) => held += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if failure.is_none() {
            ws.flush();
            pause(self.timing.key_hold);
        }

        for &keycode in sequence[..held].iter().rev() {
            if let Err(e) = ws.send_key(keycode, false, target) {
                warn!("failed to release keycode {keycode}: {e}");
                failure.get_or_insert(e);
            }
        }
        ws.flush();

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Replay the native click of `button` at the pointer's current
    /// position in `target`.
    ///
    /// Returns `Ok(false)` when the button has no replay path or the
    /// pointer position is unknown. The release is sent even if the press
    /// reported an error.
    pub fn replay_click<W: WindowSystem + ?Sized>(
        &self,
        ws: &W,
        button: LogicalButton,
        target: WindowId,
    ) -> Result<bool> {
        let Some(index) = replay_button(button) else {
            debug!("no click replay for {button}");
            return Ok(false);
        };
        let Some((x, y)) = ws.pointer_position(target) else {
            debug!("pointer position unknown, dropping {button} click");
            return Ok(false);
        };

        let pressed = ws.send_button(index, true, target, x, y);
        ws.flush();
        if pressed.is_ok() {
            pause(self.timing.click_gap);
        }
        let released = ws.send_button(index, false, target, x, y);
        ws.flush();
        pressed.and(released)?;

        debug!("replayed {button} click at ({x}, {y}) in {target}");
        Ok(true)
    }
}
