//! Key-press notification pipeline
//!
//! Subscribes to value changes on the key-press characteristic and decodes
//! each frame into a [`KeyEvent`]. Malformed frames are dropped with a
//! warning; they never end the session.

use std::collections::HashMap;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};
use zbus::fdo::{PropertiesChangedStream, PropertiesProxy};
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedObjectPath, Value};
use zbus::Connection;

use crate::bluez::{GattCharacteristic1Proxy, BUS_NAME, GATT_CHARACTERISTIC_IFACE};
use crate::error::BridgeError;

/// Bit assignments in the one-byte key-press payload
const LEFT_KEY_BIT: u8 = 0x01;
const RIGHT_KEY_BIT: u8 = 0x02;

/// Payload length of a key-press notification
const KEY_PRESS_PAYLOAD_LEN: usize = 1;

/// Decoded state of the two hardware keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub left: bool,
    pub right: bool,
}

impl KeyEvent {
    /// Decode the key bitmask; bits above the two key bits are ignored.
    pub fn from_bitmask(byte: u8) -> Self {
        Self {
            left: byte & LEFT_KEY_BIT != 0,
            right: byte & RIGHT_KEY_BIT != 0,
        }
    }
}

/// Reasons a notification frame is dropped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Value is not a byte array")]
    NotBytes,
    #[error("Expected a 1 byte payload, got {0} bytes")]
    UnexpectedLength(usize),
}

/// Extract and decode the `Value` entry of a changed-properties map.
///
/// Returns `None` when the map carries no `Value` entry (a `Notifying`
/// toggle, for example) and `Some(Err(_))` when it does but the payload is
/// malformed.
pub fn decode_value_change(
    changed: &HashMap<&str, Value<'_>>,
) -> Option<Result<KeyEvent, DecodeError>> {
    changed.get("Value").map(decode_value)
}

fn decode_value(value: &Value<'_>) -> Result<KeyEvent, DecodeError> {
    let Value::Array(items) = value else {
        return Err(DecodeError::NotBytes);
    };

    if items.len() != KEY_PRESS_PAYLOAD_LEN {
        return Err(DecodeError::UnexpectedLength(items.len()));
    }

    match items.first() {
        Some(Value::U8(byte)) => Ok(KeyEvent::from_bitmask(*byte)),
        _ => Err(DecodeError::NotBytes),
    }
}

/// Active notification subscription on the key-press characteristic
///
/// Holds the signal stream and the proxy used to stop notifications again.
/// Consuming [`Notifications::stop`] makes a second `StopNotify`
/// unrepresentable.
pub struct Notifications {
    characteristic: GattCharacteristic1Proxy<'static>,
    stream: PropertiesChangedStream,
    path: OwnedObjectPath,
}

impl Notifications {
    /// Start notifications on the characteristic at `path` and register for
    /// its `PropertiesChanged` frames.
    pub async fn subscribe(
        conn: &Connection,
        path: &OwnedObjectPath,
    ) -> Result<Self, BridgeError> {
        let characteristic = GattCharacteristic1Proxy::builder(conn)
            .cache_properties(CacheProperties::No)
            .path(path.clone())?
            .build()
            .await?;

        characteristic
            .start_notify()
            .await
            .map_err(|source| BridgeError::Call {
                operation: "StartNotify",
                path: path.to_string(),
                source,
            })?;

        let stream = match value_changes(conn, path).await {
            Ok(stream) => stream,
            Err(e) => {
                // The StartNotify went through but no handler will ever
                // drain it; undo it so the peripheral is not left
                // notifying into the void.
                stop_notify_best_effort(&characteristic, path).await;
                return Err(e);
            }
        };

        info!("Subscribed to key presses on {}", path);

        Ok(Self {
            characteristic,
            stream,
            path: path.clone(),
        })
    }

    /// Next decoded key event, or `None` once the stream ends (bus gone).
    ///
    /// Frames for other interfaces and frames without a `Value` entry are
    /// skipped silently; malformed payloads are logged and skipped.
    pub async fn next_event(&mut self) -> Option<KeyEvent> {
        while let Some(change) = self.stream.next().await {
            let args = match change.args() {
                Ok(args) => args,
                Err(e) => {
                    warn!("Malformed PropertiesChanged frame: {}", e);
                    continue;
                }
            };

            if args.interface_name().as_str() != GATT_CHARACTERISTIC_IFACE {
                continue;
            }

            match decode_value_change(args.changed_properties()) {
                Some(Ok(event)) => {
                    debug!("Key event: left={} right={}", event.left, event.right);
                    return Some(event);
                }
                Some(Err(e)) => warn!("Dropping key-press frame: {}", e),
                None => {}
            }
        }
        None
    }

    /// Stop notifications and drop the signal subscription.
    ///
    /// `StopNotify` failures are logged and swallowed; at teardown the
    /// daemon may already be gone.
    pub async fn stop(self) {
        stop_notify_best_effort(&self.characteristic, &self.path).await;
    }
}

/// Register for `PropertiesChanged` frames on the characteristic path,
/// tagged with the characteristic interface. Value changes arrive there.
async fn value_changes(
    conn: &Connection,
    path: &OwnedObjectPath,
) -> Result<PropertiesChangedStream, BridgeError> {
    let properties = PropertiesProxy::builder(conn)
        .destination(BUS_NAME)?
        .path(path.clone())?
        .build()
        .await?;

    Ok(properties
        .receive_properties_changed_with_args(&[(0, GATT_CHARACTERISTIC_IFACE)])
        .await?)
}

async fn stop_notify_best_effort(
    characteristic: &GattCharacteristic1Proxy<'_>,
    path: &OwnedObjectPath,
) {
    match characteristic.stop_notify().await {
        Ok(()) => info!("Stopped notifications on {}", path),
        Err(e) => warn!("StopNotify on {} failed: {}", path, e),
    }
}
