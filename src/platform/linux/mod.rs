//! Linux platform implementation.
//!
//! Two backends, each behind a Cargo feature:
//! - **x11**: window queries, focus and XTest key/button injection
//! - **evdev**: grabbed input device and uinput virtual mouse
//!
//! ## Feature Flags
//!
//! - `x11` (default): [`XlibWindowSystem`]
//! - `evdev` (default): [`EvdevSource`] and [`UinputSink`]
//!
//! The chord engine itself needs neither; both are required by the daemon.

#[cfg(feature = "x11")]
mod x11;

#[cfg(feature = "evdev")]
mod evdev;

#[cfg(feature = "x11")]
pub use self::x11::XlibWindowSystem;

#[cfg(feature = "evdev")]
pub use self::evdev::{EvdevSource, UinputSink, VIRTUAL_DEVICE_NAME, find_pointer_device};
