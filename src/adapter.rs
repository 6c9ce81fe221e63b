use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// UUIDs served by the reference peripheral firmware.
#[allow(dead_code)]
pub mod device_uuids {
    use uuid::Uuid;
    /// Advertised in the peripheral's advertising data
    pub const ADVERTISED_SVC_UUID: Uuid = Uuid::from_u128(0x038A803F_F6B3_420B_A95A_10CC7B32B6DB);
    /// Primary GATT service
    pub const CUSTOM_SVC_UUID: Uuid = Uuid::from_u128(0x938A803F_F6B3_420B_A95A_10CC7B32B6DB);
    /// Control / string characteristic (LED commands, greeting string)
    pub const CONTROL_CHAR_UUID: Uuid = Uuid::from_u128(0xA38A803F_F6B3_420B_A95A_10CC7B32B6DB);
    /// Temperature characteristic, 2 bytes: whole degrees then hundredths
    pub const TEMP_CHAR_UUID: Uuid = Uuid::from_u128(0xB38A803F_F6B3_420B_A95A_10CC7B32B6DB);
}

pub type AdapterError = Box<dyn Error + Send + Sync>;

/// A peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub id: String,
    pub address: String,
    pub name: Option<String>,
    pub services: Vec<Uuid>,
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => write!(f, "<unnamed> ({})", self.address),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharProps {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl fmt::Display for CharProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<&str> = [
            (self.read, "read"),
            (self.write, "write"),
            (self.write_without_response, "write-without-response"),
            (self.notify, "notify"),
            (self.indicate, "indicate"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        if flags.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub properties: CharProps,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicInfo>,
}

/// Scan/connect/read/write primitives of a BLE central.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    type Connection: Send + Sync;

    /// Scan for `duration`, returning devices in the order they were first seen
    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceHandle>, AdapterError>;
    async fn connect(&self, device: &DeviceHandle) -> Result<Self::Connection, AdapterError>;
    async fn read(&self, conn: &Self::Connection, characteristic: Uuid) -> Result<Vec<u8>, AdapterError>;
    async fn write(&self, conn: &Self::Connection, characteristic: Uuid, bytes: &[u8]) -> Result<(), AdapterError>;
    async fn list_services(&self, conn: &Self::Connection) -> Result<Vec<ServiceInfo>, AdapterError>;
    async fn disconnect(&self, conn: &Self::Connection) -> Result<(), AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn props_display_lists_set_flags() {
        let props = CharProps { read: true, notify: true, ..Default::default() };
        assert_eq!(props.to_string(), "read|notify");
        assert_eq!(CharProps::default().to_string(), "-");
    }

    #[test]
    fn device_uuids_parse_from_lowercase_text() {
        let parsed: Uuid = "038a803f-f6b3-420b-a95a-10cc7b32b6db".parse().unwrap();
        assert_eq!(parsed, device_uuids::ADVERTISED_SVC_UUID);
        let upper: Uuid = "A38A803F-F6B3-420B-A95A-10CC7B32B6DB".parse().unwrap();
        assert_eq!(upper, device_uuids::CONTROL_CHAR_UUID);
    }
}
