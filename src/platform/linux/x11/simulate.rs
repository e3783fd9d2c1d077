//! X11 input injection using XTest.

use crate::error::{Error, Result};
use crate::window::WindowId;
use std::os::raw::{c_int, c_uint};
use x11::xlib;
use x11::xtest;

const TRUE: c_int = 1;
const FALSE: c_int = 0;

fn bool_arg(pressed: bool) -> c_int {
    if pressed { TRUE } else { FALSE }
}

/// Whether the server supports XTest.
pub(super) fn has_xtest(display: *mut xlib::Display) -> bool {
    let mut event_base = 0;
    let mut error_base = 0;
    let mut major = 0;
    let mut minor = 0;
    let result = unsafe {
        xtest::XTestQueryExtension(
            display,
            &mut event_base,
            &mut error_base,
            &mut major,
            &mut minor,
        )
    };
    if result != FALSE {
        log::debug!("XTest {major}.{minor}");
    }
    result != FALSE
}

/// Press or release a key.
pub(super) fn fake_key(display: *mut xlib::Display, keycode: u8, pressed: bool) -> Result<()> {
    let result =
        unsafe { xtest::XTestFakeKeyEvent(display, keycode as c_uint, bool_arg(pressed), 0) };

    if result == 0 {
        Err(Error::Simulate(format!(
            "XTestFakeKeyEvent failed for keycode {keycode}"
        )))
    } else {
        Ok(())
    }
}

/// Press or release a pointer button. XTest delivers it at the current
/// pointer position.
pub(super) fn fake_button(display: *mut xlib::Display, button: u8, pressed: bool) -> Result<()> {
    let result =
        unsafe { xtest::XTestFakeButtonEvent(display, button as c_uint, bool_arg(pressed), 0) };

    if result == 0 {
        Err(Error::Simulate(format!(
            "XTestFakeButtonEvent failed for button {button}"
        )))
    } else {
        Ok(())
    }
}

/// Give keyboard focus to `window`.
pub(super) fn set_input_focus(display: *mut xlib::Display, window: WindowId) -> Result<()> {
    // Errors arrive asynchronously through the error handler.
    unsafe {
        xlib::XSetInputFocus(
            display,
            window.0 as xlib::Window,
            xlib::RevertToPointerRoot,
            xlib::CurrentTime,
        );
    }
    Ok(())
}
