//! GATT attribute value records.
//!
//! Plain data carried alongside adapter handles once a peer's attribute
//! table has been read. These records have no lifecycle of their own; they
//! exist so callers and the scan tool have a typed, serializable shape for
//! services, characteristics, and descriptors.
//!
//! Instance ids are dotted paths rooted at the owning device's instance id
//! (`680123456.1`, `680123456.1.2`, ...), so any attribute can be traced
//! back to its device with [`device_instance_id`].

use serde::{Deserialize, Serialize};

/// Compose a child attribute id under `parent`.
pub fn child_instance_id(parent: &str, index: u32) -> String {
    format!("{parent}.{index}")
}

/// The owning device id: everything before the first dot.
pub fn device_instance_id(instance_id: &str) -> &str {
    instance_id
        .split_once('.')
        .map_or(instance_id, |(device, _)| device)
}

/// Human name for a handful of Bluetooth-assigned 16-bit service UUIDs.
pub fn service_name_for_uuid(uuid: &str) -> Option<&'static str> {
    match uuid.to_ascii_uppercase().as_str() {
        "1800" => Some("Generic Access"),
        "1801" => Some("Generic Attribute"),
        "180A" => Some("Device Information"),
        "180D" => Some("Heart Rate"),
        "180F" => Some("Battery Service"),
        "1812" => Some("Human Interface Device"),
        _ => None,
    }
}

/// One GATT service on a peer device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub instance_id: String,
    /// UUID as a hex string, 16-bit (`180F`) or 128-bit.
    pub uuid: String,
    pub start_handle: Option<u16>,
    pub end_handle: Option<u16>,
}

impl Service {
    pub fn new(device_instance_id: &str, index: u32, uuid: impl Into<String>) -> Self {
        Self {
            instance_id: child_instance_id(device_instance_id, index),
            uuid: uuid.into(),
            start_handle: None,
            end_handle: None,
        }
    }

    /// Assigned-numbers name for this service, when it is a well-known one.
    pub fn name(&self) -> Option<&'static str> {
        service_name_for_uuid(&self.uuid)
    }
}

/// Property bits of a characteristic declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
}

/// One GATT characteristic under a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub instance_id: String,
    pub uuid: String,
    pub declaration_handle: Option<u16>,
    pub value_handle: Option<u16>,
    pub properties: CharacteristicProperties,
    pub value: Vec<u8>,
}

impl Characteristic {
    pub fn new(
        service_instance_id: &str,
        index: u32,
        uuid: impl Into<String>,
        properties: CharacteristicProperties,
        value: Vec<u8>,
    ) -> Self {
        Self {
            instance_id: child_instance_id(service_instance_id, index),
            uuid: uuid.into(),
            declaration_handle: None,
            value_handle: None,
            properties,
            value,
        }
    }
}

/// One GATT descriptor under a characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub instance_id: String,
    pub uuid: String,
    pub handle: Option<u16>,
    pub value: Vec<u8>,
}

impl Descriptor {
    pub fn new(
        characteristic_instance_id: &str,
        index: u32,
        uuid: impl Into<String>,
        value: Vec<u8>,
    ) -> Self {
        Self {
            instance_id: child_instance_id(characteristic_instance_id, index),
            uuid: uuid.into(),
            handle: None,
            value,
        }
    }
}
