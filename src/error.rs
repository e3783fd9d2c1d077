//! Error types for the chord remapper.

use crate::keycode::Key;
use thiserror::Error;

/// Result type alias for eeka operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading rules or driving the devices.
#[derive(Debug, Error)]
pub enum Error {
    /// A line of the rule file could not be understood.
    #[error("config line {line}: {message}")]
    Config {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// I/O error on a file or device.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The window system refused or failed a request.
    #[error("window system error: {0}")]
    WindowSystem(String),

    /// A key identity has no key code in the current keyboard mapping.
    #[error("no keycode for key {0}")]
    KeyUnresolvable(Key),

    /// Failed to inject a synthetic event.
    #[error("failed to simulate event: {0}")]
    Simulate(String),

    /// The operation requires elevated permissions.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device was found.
    #[error("no input device: {0}")]
    NoDevice(String),

    /// The daemon is not running (toggle request without a live process).
    #[error("daemon is not running: {0}")]
    NotRunning(String),

    /// Platform-specific error.
    #[error("platform error: {0}")]
    Platform(String),
}
