//! Session lifecycle
//!
//! A [`Session`] owns everything that must be undone at teardown: the
//! device link and the notification subscription. [`Session::shutdown`] is
//! idempotent and runs the teardown steps in a fixed order, notifications
//! first, then the device.

use tracing::info;
use zbus::Connection;

use crate::device::{DeviceLink, LinkState};
use crate::error::BridgeError;
use crate::notify::{KeyEvent, Notifications};
use crate::scan::DiscoveredCharacteristic;

/// Everything established for one bridged characteristic
pub struct Session {
    conn: Connection,
    link: Option<DeviceLink>,
    notifications: Option<Notifications>,
}

impl Session {
    /// A session with nothing established yet.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            link: None,
            notifications: None,
        }
    }

    /// Connect the device owning `target` and subscribe to its key presses.
    ///
    /// On error the session may hold partial state; [`Session::shutdown`]
    /// undoes whatever was established.
    pub async fn establish(&mut self, target: &DiscoveredCharacteristic) -> Result<(), BridgeError> {
        let link = DeviceLink::attach(&self.conn, target.device_path.clone()).await?;
        let link = self.link.insert(link);
        link.ensure_connected().await?;

        let notifications = Notifications::subscribe(&self.conn, &target.path).await?;
        self.notifications = Some(notifications);

        Ok(())
    }

    /// Next decoded key event.
    ///
    /// `None` once the notification stream has ended or when nothing is
    /// subscribed (after [`Session::shutdown`]).
    pub async fn next_event(&mut self) -> Option<KeyEvent> {
        match self.notifications.as_mut() {
            Some(notifications) => notifications.next_event().await,
            None => None,
        }
    }

    /// State of the device link.
    pub fn link_state(&self) -> LinkState {
        self.link.as_ref().map_or(LinkState::Unknown, DeviceLink::state)
    }

    /// Tear the session down: stop notifications, then release the device.
    ///
    /// Calling it again, or on a session that never established anything,
    /// does nothing.
    pub async fn shutdown(&mut self) {
        if self.notifications.is_none() && self.link.is_none() {
            return;
        }
        info!("Tearing down session");

        if let Some(notifications) = self.notifications.take() {
            notifications.stop().await;
        }
        if let Some(mut link) = self.link.take() {
            link.release().await;
        }
    }
}
