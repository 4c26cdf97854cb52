//! Bus object catalog scanning
//!
//! Locates the key-press GATT characteristic in a managed-object snapshot
//! and derives the owning device's object path from the characteristic
//! path. Everything here is pure so it can be tested without a bus.

use tracing::warn;
use zbus::fdo::ManagedObjects;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, Value};

use crate::bluez::GATT_CHARACTERISTIC_IFACE;

/// SensorTag simple key service UUID
pub const KEY_PRESS_SERVICE_UUID: &str = "0000ffe0-0000-1000-8000-00805f9b34fb";

/// SensorTag key-press state characteristic UUID (the notification source)
pub const KEY_PRESS_DATA_UUID: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";

/// Path segments between a characteristic and its device:
/// `<device>/serviceXXXX/charYYYY`.
pub const SEGMENTS_BELOW_DEVICE: usize = 2;

/// A characteristic found in the object tree, together with the device
/// object that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCharacteristic {
    pub path: OwnedObjectPath,
    pub device_path: OwnedObjectPath,
}

/// Scan a managed-object snapshot for the characteristic advertising `uuid`.
///
/// The first match in snapshot order wins; further matches are logged and
/// ignored. Snapshot order is hash-map order and deliberately unspecified.
/// UUIDs are compared verbatim; BlueZ emits them in canonical lowercase.
pub fn find_characteristic(
    objects: &ManagedObjects,
    uuid: &str,
) -> Option<DiscoveredCharacteristic> {
    let mut found: Option<DiscoveredCharacteristic> = None;

    for (path, interfaces) in objects {
        let Some(properties) = interfaces
            .iter()
            .find(|(name, _)| name.as_str() == GATT_CHARACTERISTIC_IFACE)
            .map(|(_, properties)| properties)
        else {
            continue;
        };

        let uuid_matches = properties.get("UUID").is_some_and(|value| match &**value {
            Value::Str(s) => s.as_str() == uuid,
            _ => false,
        });
        if !uuid_matches {
            continue;
        }

        if found.is_some() {
            warn!("Ignoring additional characteristic with UUID {} at {}", uuid, path);
            continue;
        }

        let Some(device_path) = device_path_for(path) else {
            warn!("Characteristic {} has no device above it, skipping", path);
            continue;
        };

        found = Some(DiscoveredCharacteristic {
            path: path.clone(),
            device_path,
        });
    }

    found
}

/// Derive the path of the device owning `characteristic` by dropping
/// [`SEGMENTS_BELOW_DEVICE`] trailing segments.
///
/// Returns `None` when the path is too shallow to have a device above the
/// dropped segments.
pub fn device_path_for(characteristic: &ObjectPath<'_>) -> Option<OwnedObjectPath> {
    let segments: Vec<&str> = characteristic
        .as_str()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() <= SEGMENTS_BELOW_DEVICE {
        return None;
    }

    let device = format!(
        "/{}",
        segments[..segments.len() - SEGMENTS_BELOW_DEVICE].join("/")
    );

    ObjectPath::try_from(device).ok().map(OwnedObjectPath::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use zbus::names::OwnedInterfaceName;
    use zbus::zvariant::OwnedValue;

    const CHAR_PATH: &str = "/org/bluez/hci0/dev_A0_E6_F8_42_9C_96/service0025/char0026";
    const DEVICE_PATH: &str = "/org/bluez/hci0/dev_A0_E6_F8_42_9C_96";

    fn string_value(s: &str) -> OwnedValue {
        Value::from(s).try_to_owned().unwrap()
    }

    fn interface_name(name: &str) -> OwnedInterfaceName {
        OwnedInterfaceName::try_from(name).unwrap()
    }

    fn object_path(path: &str) -> OwnedObjectPath {
        OwnedObjectPath::try_from(path).unwrap()
    }

    /// Snapshot with one GATT characteristic entry per (path, uuid) pair.
    fn snapshot(entries: &[(&str, &str)]) -> ManagedObjects {
        let mut objects = ManagedObjects::new();
        for (path, uuid) in entries {
            let mut properties = HashMap::new();
            properties.insert("UUID".to_string(), string_value(uuid));

            let mut interfaces = HashMap::new();
            interfaces.insert(interface_name(GATT_CHARACTERISTIC_IFACE), properties);

            objects.insert(object_path(path), interfaces);
        }
        objects
    }

    #[test]
    fn test_finds_characteristic_and_device() {
        let mut objects = snapshot(&[(CHAR_PATH, KEY_PRESS_DATA_UUID)]);

        // A device object without the characteristic interface is skipped.
        let mut device_props = HashMap::new();
        device_props.insert("Connected".to_string(), Value::from(false).try_to_owned().unwrap());
        let mut device_ifaces = HashMap::new();
        device_ifaces.insert(interface_name(crate::bluez::DEVICE_IFACE), device_props);
        objects.insert(object_path(DEVICE_PATH), device_ifaces);

        let found = find_characteristic(&objects, KEY_PRESS_DATA_UUID).unwrap();
        assert_eq!(found.path.as_str(), CHAR_PATH);
        assert_eq!(found.device_path.as_str(), DEVICE_PATH);
    }

    #[test]
    fn test_no_match_returns_none() {
        let objects = snapshot(&[(CHAR_PATH, "0000aa00-0000-1000-8000-00805f9b34fb")]);
        assert_eq!(find_characteristic(&objects, KEY_PRESS_DATA_UUID), None);
        assert_eq!(find_characteristic(&ManagedObjects::new(), KEY_PRESS_DATA_UUID), None);
    }

    #[test]
    fn test_uuid_comparison_is_exact() {
        // BlueZ never emits uppercase UUIDs; an uppercase entry is no match.
        let objects = snapshot(&[(CHAR_PATH, "0000FFE1-0000-1000-8000-00805F9B34FB")]);
        assert_eq!(find_characteristic(&objects, KEY_PRESS_DATA_UUID), None);
    }

    #[test]
    fn test_first_match_wins_among_duplicates() {
        let other_path = "/org/bluez/hci0/dev_11_22_33_44_55_66/service000a/char000b";
        let objects = snapshot(&[
            (CHAR_PATH, KEY_PRESS_DATA_UUID),
            (other_path, KEY_PRESS_DATA_UUID),
        ]);

        // Iteration order is unspecified; exactly one of the two must win.
        let found = find_characteristic(&objects, KEY_PRESS_DATA_UUID).unwrap();
        assert!(found.path.as_str() == CHAR_PATH || found.path.as_str() == other_path);
    }

    #[test]
    fn test_non_string_uuid_is_no_match() {
        let mut properties = HashMap::new();
        properties.insert("UUID".to_string(), Value::from(42u32).try_to_owned().unwrap());
        let mut interfaces = HashMap::new();
        interfaces.insert(interface_name(GATT_CHARACTERISTIC_IFACE), properties);
        let mut objects = ManagedObjects::new();
        objects.insert(object_path(CHAR_PATH), interfaces);

        assert_eq!(find_characteristic(&objects, KEY_PRESS_DATA_UUID), None);
    }

    #[test]
    fn test_device_path_two_segments_up() {
        let path = object_path(CHAR_PATH);
        let device = device_path_for(&path).unwrap();
        assert_eq!(device.as_str(), DEVICE_PATH);
    }

    #[test]
    fn test_device_path_needs_a_segment_above() {
        // Exactly SEGMENTS_BELOW_DEVICE segments: nothing left for a device.
        let too_shallow = object_path("/service0025/char0026");
        assert_eq!(device_path_for(&too_shallow), None);

        let root = ObjectPath::try_from("/").unwrap();
        assert_eq!(device_path_for(&root), None);

        // One extra segment is enough.
        let minimal = object_path("/dev/service0025/char0026");
        assert_eq!(device_path_for(&minimal).unwrap().as_str(), "/dev");
    }

    #[test]
    fn test_too_shallow_candidate_is_skipped() {
        let objects = snapshot(&[("/service0025/char0026", KEY_PRESS_DATA_UUID)]);
        assert_eq!(find_characteristic(&objects, KEY_PRESS_DATA_UUID), None);
    }
}
