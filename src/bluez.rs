//! BlueZ D-Bus client surface
//!
//! Proxies for the `org.bluez` interfaces the bridge talks to, plus the
//! managed-object snapshot fetch. Only the members the bridge actually
//! calls are declared.

use zbus::fdo::{ManagedObjects, ObjectManagerProxy};
use zbus::Connection;

use crate::error::BridgeError;

/// Bus name of the Bluetooth daemon
pub const BUS_NAME: &str = "org.bluez";

/// Interface exposed by every remote device object
pub const DEVICE_IFACE: &str = "org.bluez.Device1";

/// Interface exposed by every GATT characteristic object
pub const GATT_CHARACTERISTIC_IFACE: &str = "org.bluez.GattCharacteristic1";

#[zbus::proxy(
    interface = "org.bluez.Device1",
    default_service = "org.bluez",
    gen_blocking = false
)]
pub trait Device1 {
    /// Initiate a connection to the remote device
    fn connect(&self) -> zbus::Result<()>;

    /// Drop the connection to the remote device
    fn disconnect(&self) -> zbus::Result<()>;

    /// Whether the device currently has an active connection
    #[zbus(property)]
    fn connected(&self) -> zbus::Result<bool>;
}

#[zbus::proxy(
    interface = "org.bluez.GattCharacteristic1",
    default_service = "org.bluez",
    gen_blocking = false
)]
pub trait GattCharacteristic1 {
    /// Enable value-change notifications for this characteristic
    fn start_notify(&self) -> zbus::Result<()>;

    /// Disable value-change notifications again
    fn stop_notify(&self) -> zbus::Result<()>;
}

/// Fetch the full object snapshot from the Bluetooth daemon.
///
/// One `GetManagedObjects` round trip; the result is scanned offline by
/// [`crate::scan::find_characteristic`].
pub async fn managed_objects(conn: &Connection) -> Result<ManagedObjects, BridgeError> {
    let object_manager = ObjectManagerProxy::builder(conn)
        .destination(BUS_NAME)?
        .path("/")?
        .build()
        .await?;

    object_manager
        .get_managed_objects()
        .await
        .map_err(BridgeError::ObjectQuery)
}
