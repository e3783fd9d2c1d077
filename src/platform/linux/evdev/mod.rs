//! Linux evdev implementation.
//!
//! The physical mouse is read from `/dev/input/event*` under an exclusive
//! grab, and everything that is not remapped is replayed through a uinput
//! virtual device.
//!
//! ## Permissions
//!
//! Both the device node and `/dev/uinput` must be accessible. Either:
//! - Run as root (not recommended)
//! - Run as a user in the `input` group (recommended)
//!
//! To add yourself to the input group:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

mod listen;
mod simulate;

pub use listen::{EvdevSource, find_pointer_device};
pub use simulate::{UinputSink, VIRTUAL_DEVICE_NAME};
