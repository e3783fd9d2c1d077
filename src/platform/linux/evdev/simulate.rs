//! Virtual output device using uinput.
//!
//! Events the engine lets through are replayed here so the rest of the
//! desktop sees a normal mouse.

use crate::button::{EV_SYN, RawEvent, SYN_REPORT};
use crate::error::{Error, Result};
use crate::runloop::OutputSink;
use evdev::{
    AttributeSet, EventType as EvdevEventType, InputEvent, Key as EvdevKey, RelativeAxisType,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};

/// Name of the virtual device. Device auto-detection skips it.
pub const VIRTUAL_DEVICE_NAME: &str = "eeka virtual mouse";

/// Forwards raw events to a uinput mouse.
pub struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    /// Create the virtual mouse.
    pub fn create() -> Result<Self> {
        let mut keys = AttributeSet::<EvdevKey>::new();
        keys.insert(EvdevKey::BTN_LEFT);
        keys.insert(EvdevKey::BTN_RIGHT);
        keys.insert(EvdevKey::BTN_MIDDLE);
        keys.insert(EvdevKey::BTN_SIDE);
        keys.insert(EvdevKey::BTN_EXTRA);
        keys.insert(EvdevKey::BTN_FORWARD);
        keys.insert(EvdevKey::BTN_BACK);

        let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
        rel_axes.insert(RelativeAxisType::REL_X);
        rel_axes.insert(RelativeAxisType::REL_Y);
        rel_axes.insert(RelativeAxisType::REL_WHEEL);
        rel_axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(|e| Error::Simulate(format!("Failed to open /dev/uinput: {}", e)))?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&keys)
            .map_err(|e| Error::Simulate(format!("Failed to add buttons: {}", e)))?
            .with_relative_axes(&rel_axes)
            .map_err(|e| Error::Simulate(format!("Failed to add relative axes: {}", e)))?
            .build()
            .map_err(|e| {
                Error::PermissionDenied(format!(
                    "Failed to create virtual device: {}. Make sure /dev/uinput is accessible \
                     (you may need to be in the 'input' group or have appropriate udev rules).",
                    e
                ))
            })?;

        log::info!("Created virtual mouse device");
        Ok(Self { device })
    }
}

impl OutputSink for UinputSink {
    fn forward(&mut self, event: &RawEvent) -> Result<()> {
        // `emit` already terminates every batch with SYN_REPORT.
        if event.kind == EV_SYN && event.code == SYN_REPORT {
            return Ok(());
        }
        let events = [InputEvent::new(
            EvdevEventType(event.kind),
            event.code,
            event.value,
        )];
        self.device
            .emit(&events)
            .map_err(|e| Error::Simulate(format!("Failed to emit event: {}", e)))
    }
}
