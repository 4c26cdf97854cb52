//! Bridges a TI SensorTag's key-press characteristic into a virtual
//! pointer device.
//!
//! The pieces, in the order the binary uses them:
//!
//! - [`scan`] finds the key-press characteristic in BlueZ's object tree
//!   and derives the owning device path from it.
//! - [`device`] connects the device, remembering whether the connection
//!   was ours to undo.
//! - [`notify`] subscribes to value notifications and decodes the
//!   one-byte key bitmask.
//! - [`session`] ties link and subscription together behind a single
//!   idempotent teardown.
//! - [`hid`] is the uinput sink the decoded presses are replayed into.

pub mod bluez;
pub mod device;
pub mod error;
pub mod hid;
pub mod notify;
pub mod scan;
pub mod session;

pub use device::{DeviceLink, LinkState};
pub use error::BridgeError;
pub use hid::{PointerError, VirtualPointer};
pub use notify::{DecodeError, KeyEvent, Notifications};
pub use scan::{DiscoveredCharacteristic, KEY_PRESS_DATA_UUID, KEY_PRESS_SERVICE_UUID};
pub use session::Session;
