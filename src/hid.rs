//! Virtual pointer device using evdev/uinput
//!
//! Creates the virtual mouse the decoded key presses are replayed on. The
//! device declares relative axes and a middle button so it probes as a
//! normal three-button mouse, but only the left and right buttons are ever
//! driven.

use evdev::{
    uinput::{VirtualDevice, VirtualDeviceBuilder},
    AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType,
};
use thiserror::Error;

/// USB identity the virtual pointer reports
pub const VENDOR_ID: u16 = 0x15d9;
pub const PRODUCT_ID: u16 = 0x0a37;

/// Default device name, as shown in `/proc/bus/input/devices`
pub const DEFAULT_DEVICE_NAME: &str = "sensortag-hid";

/// Errors from virtual pointer operations
#[derive(Debug, Error)]
pub enum PointerError {
    #[error("Failed to create virtual device: {0}")]
    CreateDevice(#[source] std::io::Error),
    #[error("Failed to emit event: {0}")]
    EmitEvent(#[source] std::io::Error),
    #[error("Device not initialized")]
    NotInitialized,
}

/// Virtual three-button pointer device
pub struct VirtualPointer {
    device: Option<VirtualDevice>,
}

impl VirtualPointer {
    /// Create the uinput device.
    ///
    /// # Arguments
    /// * `name` - Device name (shown in `evtest` and the input device list)
    pub fn create(name: &str) -> Result<Self, PointerError> {
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::BTN_LEFT);
        keys.insert(Key::BTN_RIGHT);
        keys.insert(Key::BTN_MIDDLE);

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(PointerError::CreateDevice)?
            .name(name)
            .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, 0))
            .with_keys(&keys)
            .map_err(PointerError::CreateDevice)?
            .with_relative_axes(&axes)
            .map_err(PointerError::CreateDevice)?
            .build()
            .map_err(PointerError::CreateDevice)?;

        Ok(Self {
            device: Some(device),
        })
    }

    /// Emit the state of both buttons as key events.
    pub fn emit(&mut self, left: bool, right: bool) -> Result<(), PointerError> {
        let device = self.device.as_mut().ok_or(PointerError::NotInitialized)?;

        let events = [
            InputEvent::new_now(EventType::KEY, Key::BTN_LEFT.code(), left as i32),
            InputEvent::new_now(EventType::KEY, Key::BTN_RIGHT.code(), right as i32),
        ];

        device.emit(&events).map_err(PointerError::EmitEvent)
    }

    /// Get the device path (e.g., /dev/input/eventX)
    pub fn device_path(&mut self) -> Option<std::path::PathBuf> {
        self.device
            .as_mut()?
            .enumerate_dev_nodes_blocking()
            .ok()?
            .next()?
            .ok()
    }

    /// Destroy the device. Safe to call more than once.
    pub fn close(&mut self) {
        self.device = None;
    }
}
