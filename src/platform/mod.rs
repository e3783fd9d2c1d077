//! Platform-specific implementations.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::*;

// evdev, uinput and X11 are only wired up on Linux
#[cfg(not(target_os = "linux"))]
compile_error!("eeka only supports Linux");
