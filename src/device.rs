//! Device connection supervision
//!
//! Tracks the connection of the peripheral behind the key-press
//! characteristic, connects it when needed and releases it at teardown.
//! Only a connection this process initiated is torn down again; a device
//! that was already connected stays connected.

use tracing::{debug, info, warn};
use zbus::proxy::CacheProperties;
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

use crate::bluez::Device1Proxy;
use crate::error::BridgeError;

/// Connection state of the peripheral, as far as the bridge knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not probed yet
    Unknown,
    /// Probed: no active connection
    Disconnected,
    /// Connect call in flight
    Connecting,
    /// Active connection (probed, or established by us)
    Connected,
    /// Connect call failed
    Failed,
}

/// Handle on the device object owning the key-press characteristic
pub struct DeviceLink {
    proxy: Device1Proxy<'static>,
    path: OwnedObjectPath,
    state: LinkState,
    connected_by_us: bool,
}

impl DeviceLink {
    /// Attach to the device object at `path`.
    ///
    /// Property caching is off so the `Connected` probe is a literal
    /// `Properties.Get` on the bus.
    pub async fn attach(conn: &Connection, path: OwnedObjectPath) -> Result<Self, BridgeError> {
        let proxy = Device1Proxy::builder(conn)
            .cache_properties(CacheProperties::No)
            .path(path.clone())?
            .build()
            .await?;

        Ok(Self {
            proxy,
            path,
            state: LinkState::Unknown,
            connected_by_us: false,
        })
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Make sure the device is connected, connecting it if necessary.
    ///
    /// `Connect` is issued at most once per link. A device that is already
    /// connected is left alone, and [`DeviceLink::release`] will leave it
    /// connected too.
    pub async fn ensure_connected(&mut self) -> Result<(), BridgeError> {
        let connected =
            self.proxy
                .connected()
                .await
                .map_err(|source| BridgeError::PropertyRead {
                    property: "Connected",
                    path: self.path.to_string(),
                    source,
                })?;

        if connected {
            self.state = LinkState::Connected;
            info!("Device {} already connected", self.path);
            return Ok(());
        }

        self.state = LinkState::Connecting;
        debug!("Connecting to {}", self.path);

        match self.proxy.connect().await {
            Ok(()) => {
                self.state = LinkState::Connected;
                self.connected_by_us = true;
                info!("Connected to {}", self.path);
                Ok(())
            }
            Err(source) => {
                self.state = LinkState::Failed;
                Err(BridgeError::Call {
                    operation: "Connect",
                    path: self.path.to_string(),
                    source,
                })
            }
        }
    }

    /// Release the device: disconnect it if and only if this process
    /// connected it. Safe to call more than once; failures are logged and
    /// swallowed.
    pub async fn release(&mut self) {
        if !self.connected_by_us {
            debug!("Nothing to release for {}", self.path);
            return;
        }
        self.connected_by_us = false;

        match self.proxy.disconnect().await {
            Ok(()) => info!("Disconnected from {}", self.path),
            Err(e) => warn!("Disconnect on {} failed: {}", self.path, e),
        }
        self.state = LinkState::Disconnected;
    }
}
