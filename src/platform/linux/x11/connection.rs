//! Xlib connection implementing [`WindowSystem`].

use std::os::fd::RawFd;
use std::os::raw::{c_char, c_int, c_long, c_uchar, c_uint, c_ulong};
use std::ptr::{self, null};
use std::slice;

use log::{debug, info};
use x11::xlib;

use super::simulate;
use crate::action::Modifiers;
use crate::error::{Error, Result};
use crate::keycode::Key;
use crate::window::{ClassHint, WindowId, WindowSystem, parse_wm_class};

const FALSE: c_int = 0;

/// Upper bound on `WM_CLASS` length, in 32-bit units.
const WM_CLASS_MAX_LONGS: c_long = 1024;

/// Keys whose state decides the keyboard-modifier bypass.
const MODIFIER_KEYS: [(Key, Modifiers); 8] = [
    (Key::ControlLeft, Modifiers::CTRL),
    (Key::ControlRight, Modifiers::CTRL),
    (Key::ShiftLeft, Modifiers::SHIFT),
    (Key::ShiftRight, Modifiers::SHIFT),
    (Key::AltLeft, Modifiers::ALT),
    (Key::AltRight, Modifiers::ALT),
    (Key::MetaLeft, Modifiers::SUPER),
    (Key::MetaRight, Modifiers::SUPER),
];

/// Xlib's default handler exits the process. A window can vanish between
/// two requests, so errors are only logged.
unsafe extern "C" fn log_x_error(
    _display: *mut xlib::Display,
    event: *mut xlib::XErrorEvent,
) -> c_int {
    if let Some(event) = unsafe { event.as_ref() } {
        debug!(
            "X error {} (request {}.{}) on resource 0x{:x}",
            event.error_code, event.request_code, event.minor_code, event.resourceid
        );
    }
    0
}

/// One Xlib display connection, used from the dispatch thread only.
pub struct XlibWindowSystem {
    display: *mut xlib::Display,
    root: xlib::Window,
    /// Keycodes of the modifier keys, resolved at connect time.
    modifier_keycodes: Vec<(u8, Modifiers)>,
}

impl XlibWindowSystem {
    /// Open the display named by `$DISPLAY`.
    pub fn connect() -> Result<Self> {
        let display = unsafe { xlib::XOpenDisplay(null()) };
        if display.is_null() {
            return Err(Error::WindowSystem(
                "cannot open X display (is DISPLAY set?)".into(),
            ));
        }
        unsafe { xlib::XSetErrorHandler(Some(log_x_error)) };

        if !simulate::has_xtest(display) {
            unsafe { xlib::XCloseDisplay(display) };
            return Err(Error::WindowSystem(
                "X server does not support the XTest extension".into(),
            ));
        }

        let root = unsafe { xlib::XDefaultRootWindow(display) };
        let mut ws = Self {
            display,
            root,
            modifier_keycodes: Vec::new(),
        };
        ws.modifier_keycodes = MODIFIER_KEYS
            .iter()
            .filter_map(|(key, modifier)| ws.resolve_keycode(*key).map(|code| (code, *modifier)))
            .collect();

        info!("Connected to X display (root window 0x{root:x})");
        Ok(ws)
    }

    /// `XQueryPointer` relative to `window`: `(child, win_x, win_y)`.
    fn query_pointer(&self, window: xlib::Window) -> Option<(xlib::Window, c_int, c_int)> {
        let mut root_return: xlib::Window = 0;
        let mut child_return: xlib::Window = 0;
        let mut root_x: c_int = 0;
        let mut root_y: c_int = 0;
        let mut win_x: c_int = 0;
        let mut win_y: c_int = 0;
        let mut mask: c_uint = 0;

        let same_screen = unsafe {
            xlib::XQueryPointer(
                self.display,
                window,
                &mut root_return,
                &mut child_return,
                &mut root_x,
                &mut root_y,
                &mut win_x,
                &mut win_y,
                &mut mask,
            )
        };

        if same_screen == FALSE {
            None
        } else {
            Some((child_return, win_x, win_y))
        }
    }
}

impl Drop for XlibWindowSystem {
    fn drop(&mut self) {
        unsafe { xlib::XCloseDisplay(self.display) };
    }
}

impl WindowSystem for XlibWindowSystem {
    fn window_under_pointer(&self) -> Option<WindowId> {
        match self.query_pointer(self.root) {
            Some((child, _, _)) if child != 0 => Some(WindowId(child as u64)),
            _ => None,
        }
    }

    fn root_window(&self) -> WindowId {
        WindowId(self.root as u64)
    }

    fn children_of(&self, window: WindowId) -> Vec<WindowId> {
        let mut root_return: xlib::Window = 0;
        let mut parent_return: xlib::Window = 0;
        let mut children: *mut xlib::Window = ptr::null_mut();
        let mut count: c_uint = 0;

        let status = unsafe {
            xlib::XQueryTree(
                self.display,
                window.0 as xlib::Window,
                &mut root_return,
                &mut parent_return,
                &mut children,
                &mut count,
            )
        };
        if status == 0 || children.is_null() {
            return Vec::new();
        }

        let result = unsafe { slice::from_raw_parts(children, count as usize) }
            .iter()
            .map(|w| WindowId(*w as u64))
            .collect();
        unsafe { xlib::XFree(children.cast()) };
        result
    }

    fn class_identity(&self, window: WindowId) -> Option<ClassHint> {
        let mut actual_type: xlib::Atom = 0;
        let mut actual_format: c_int = 0;
        let mut nitems: c_ulong = 0;
        let mut bytes_after: c_ulong = 0;
        let mut prop: *mut c_uchar = ptr::null_mut();

        let status = unsafe {
            xlib::XGetWindowProperty(
                self.display,
                window.0 as xlib::Window,
                xlib::XA_WM_CLASS,
                0,
                WM_CLASS_MAX_LONGS,
                FALSE,
                xlib::XA_STRING,
                &mut actual_type,
                &mut actual_format,
                &mut nitems,
                &mut bytes_after,
                &mut prop,
            )
        };
        if status != xlib::Success as c_int || prop.is_null() {
            return None;
        }

        let hint = if actual_type == xlib::XA_STRING && actual_format == 8 && nitems > 0 {
            parse_wm_class(unsafe { slice::from_raw_parts(prop, nitems as usize) })
        } else {
            None
        };
        unsafe { xlib::XFree(prop.cast()) };
        hint
    }

    fn set_focus(&self, window: WindowId) -> Result<()> {
        simulate::set_input_focus(self.display, window)
    }

    fn send_key(&self, keycode: u8, pressed: bool, _target: WindowId) -> Result<()> {
        simulate::fake_key(self.display, keycode, pressed)
    }

    fn send_button(
        &self,
        button: u8,
        pressed: bool,
        _target: WindowId,
        _x: i32,
        _y: i32,
    ) -> Result<()> {
        simulate::fake_button(self.display, button, pressed)
    }

    fn pointer_position(&self, target: WindowId) -> Option<(i32, i32)> {
        self.query_pointer(target.0 as xlib::Window)
            .map(|(_, x, y)| (x, y))
    }

    fn keyboard_modifiers_held(&self) -> Modifiers {
        let mut keys = [0 as c_char; 32];
        unsafe { xlib::XQueryKeymap(self.display, keys.as_mut_ptr()) };

        self.modifier_keycodes
            .iter()
            .filter(|(code, _)| {
                let byte = keys[(*code / 8) as usize] as u8;
                byte & (1 << (*code % 8)) != 0
            })
            .fold(Modifiers::empty(), |held, (_, modifier)| held | *modifier)
    }

    fn resolve_keycode(&self, key: Key) -> Option<u8> {
        let keysym = key.keysym();
        if keysym == 0 {
            return None;
        }
        let keycode = unsafe { xlib::XKeysymToKeycode(self.display, keysym as xlib::KeySym) };
        (keycode != 0).then_some(keycode)
    }

    fn flush(&self) {
        unsafe { xlib::XFlush(self.display) };
    }

    fn connection_fd(&self) -> Option<RawFd> {
        Some(unsafe { xlib::XConnectionNumber(self.display) })
    }

    fn drain_events(&self) {
        let mut event: xlib::XEvent = unsafe { std::mem::zeroed() };
        while unsafe { xlib::XPending(self.display) } > 0 {
            unsafe { xlib::XNextEvent(self.display, &mut event) };
        }
    }
}
