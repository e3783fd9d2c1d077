//! Grabbed evdev input device.

use crate::button::RawEvent;
use crate::error::{Error, Result};
use crate::rules::Rules;
use crate::runloop::InputSource;
use evdev::{Device, Key as EvdevKey};
use std::fs;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use super::simulate::VIRTUAL_DEVICE_NAME;

const INPUT_DIR: &str = "/dev/input";

/// Whether a device may be selected as the physical mouse.
fn is_candidate(name: &str, has_buttons: bool, rules: &Rules) -> bool {
    has_buttons && name != VIRTUAL_DEVICE_NAME && !rules.is_device_blacklisted(name)
}

/// Numeric suffix of an `eventN` node, for natural ordering.
fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// `/dev/input/event*` nodes in numeric order.
fn event_nodes() -> Result<Vec<PathBuf>> {
    let dir = fs::read_dir(INPUT_DIR).map_err(|e| {
        Error::PermissionDenied(format!(
            "Cannot access {INPUT_DIR}: {e}. Make sure you're in the 'input' group."
        ))
    })?;

    let mut nodes: Vec<PathBuf> = dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| event_number(path).is_some())
        .collect();
    nodes.sort_by_key(|path| event_number(path));
    Ok(nodes)
}

fn has_pointer_buttons(device: &Device) -> bool {
    device.supported_keys().is_some_and(|keys| {
        keys.contains(EvdevKey::BTN_LEFT) || keys.contains(EvdevKey::BTN_RIGHT)
    })
}

/// Find the first device with left or right buttons whose name is not
/// in the device blacklist of `rules`.
pub fn find_pointer_device(rules: &Rules) -> Result<PathBuf> {
    for path in event_nodes()? {
        let device = match Device::open(&path) {
            Ok(device) => device,
            Err(e) => {
                log::debug!("Failed to open {}: {}", path.display(), e);
                continue;
            }
        };
        let name = device.name().unwrap_or("unknown");
        if is_candidate(name, has_pointer_buttons(&device), rules) {
            log::info!("Found mouse device: {} ({})", path.display(), name);
            return Ok(path);
        }
        log::debug!("Skipping {} ({})", path.display(), name);
    }

    Err(Error::NoDevice(
        "no accessible device with mouse buttons found; check the 'input' group and device_blacklist"
            .into(),
    ))
}

/// An exclusively grabbed, non-blocking mouse.
pub struct EvdevSource {
    device: Device,
    path: PathBuf,
}

impl EvdevSource {
    /// Open and grab the device at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let mut device = Device::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(format!(
                "Cannot open {}: {}. Make sure you're in the 'input' group.",
                path.display(),
                e
            )),
            _ => Error::NoDevice(format!("Cannot open {}: {}", path.display(), e)),
        })?;

        set_nonblocking(device.as_raw_fd())?;

        device.grab().map_err(|e| {
            Error::PermissionDenied(format!(
                "Cannot grab exclusive access to {}: {}",
                path.display(),
                e
            ))
        })?;

        log::info!("Grabbed exclusive access to {}", path.display());
        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }

    /// Auto-detect the mouse and grab it.
    pub fn autodetect(rules: &Rules) -> Result<Self> {
        let path = find_pointer_device(rules)?;
        Self::open(&path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }
    Ok(())
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        if let Err(e) = self.device.ungrab() {
            log::debug!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}

impl InputSource for EvdevSource {
    fn raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }

    fn read_batch(&mut self) -> io::Result<Vec<RawEvent>> {
        let events = self.device.fetch_events()?;
        Ok(events
            .map(|ev| RawEvent::new(ev.event_type().0, ev.code(), ev.value()))
            .collect())
    }
}
