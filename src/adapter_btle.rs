use crate::adapter::{AdapterError, BleAdapter, CharProps, CharacteristicInfo, DeviceHandle, ServiceInfo};

use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use tokio::time::{timeout_at, Instant};
use uuid::Uuid;

fn find_characteristic_by_uuid(
    peripheral: &Peripheral,
    uuid: Uuid,
) -> Result<Characteristic, AdapterError> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == uuid)
        .ok_or_else(|| format!("characteristic {} not found", uuid).into())
}

fn char_props(flags: CharPropFlags) -> CharProps {
    CharProps {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        notify: flags.contains(CharPropFlags::NOTIFY),
        indicate: flags.contains(CharPropFlags::INDICATE),
    }
}

fn write_type_for(flags: CharPropFlags) -> WriteType {
    if !flags.contains(CharPropFlags::WRITE) && flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

/// Drops peripherals whose properties could not be read. BlueZ removes
/// temporary devices during long scans, and one vanished bystander must not
/// hide the rest of the scan.
fn keep_resolved(lookups: Vec<(String, Result<DeviceHandle, AdapterError>)>) -> Vec<DeviceHandle> {
    lookups
        .into_iter()
        .filter_map(|(id, lookup)| match lookup {
            Ok(handle) => Some(handle),
            Err(err) => {
                debug!("skipping {}: {}", id, err);
                None
            }
        })
        .collect()
}

/// `BleAdapter` over the first btleplug adapter on the host.
pub struct BtleplugAdapter {
    central: Adapter,
}

impl BtleplugAdapter {
    pub async fn new() -> anyhow::Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        info!("Found {} BLE adapter(s)", adapters.len());
        let central = adapters
            .into_iter()
            .next()
            .context("no Bluetooth adapters found")?;
        if let Ok(adapter_info) = central.adapter_info().await {
            info!("adapter = {}", adapter_info);
        }
        Ok(BtleplugAdapter { central })
    }

    async fn handle_for(&self, id: &PeripheralId) -> Result<DeviceHandle, AdapterError> {
        let peripheral = self.central.peripheral(id).await?;
        let handle = match peripheral.properties().await? {
            Some(props) => DeviceHandle {
                id: id.to_string(),
                address: props.address.to_string(),
                name: props.local_name,
                services: props.services,
            },
            None => DeviceHandle {
                id: id.to_string(),
                address: peripheral.address().to_string(),
                name: None,
                services: Vec::new(),
            },
        };
        Ok(handle)
    }
}

#[async_trait]
impl BleAdapter for BtleplugAdapter {
    type Connection = Peripheral;

    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceHandle>, AdapterError> {
        let mut events = self.central.events().await?;
        self.central.start_scan(ScanFilter::default()).await?;

        // nothing between start_scan and stop_scan can fail, so the scan is
        // always stopped once it was started
        let deadline = Instant::now() + duration;
        let mut seen: Vec<PeripheralId> = Vec::new();
        while let Ok(Some(event)) = timeout_at(deadline, events.next()).await {
            if let CentralEvent::DeviceDiscovered(id) = event {
                debug!("discovered {}", id);
                if !seen.contains(&id) {
                    seen.push(id);
                }
            }
        }
        if let Err(err) = self.central.stop_scan().await {
            warn!("stopping scan failed: {}", err);
        }

        // peripherals cached by the platform from an earlier scan never emit
        // DeviceDiscovered again
        match self.central.peripherals().await {
            Ok(known) => {
                for p in known {
                    let id = p.id();
                    if !seen.contains(&id) {
                        seen.push(id);
                    }
                }
            }
            Err(err) => warn!("listing known peripherals failed: {}", err),
        }

        // properties are read once the window closes so late service
        // advertisements are included
        let mut lookups = Vec::with_capacity(seen.len());
        for id in &seen {
            lookups.push((id.to_string(), self.handle_for(id).await));
        }
        Ok(keep_resolved(lookups))
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<Peripheral, AdapterError> {
        let peripheral = self
            .central
            .peripherals()
            .await?
            .into_iter()
            .find(|p| p.id().to_string() == device.id)
            .ok_or_else(|| format!("peripheral {} is no longer known to the adapter", device.id))?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;
        Ok(peripheral)
    }

    async fn read(&self, conn: &Peripheral, characteristic: Uuid) -> Result<Vec<u8>, AdapterError> {
        let chr = find_characteristic_by_uuid(conn, characteristic)?;
        Ok(conn.read(&chr).await?)
    }

    async fn write(&self, conn: &Peripheral, characteristic: Uuid, bytes: &[u8]) -> Result<(), AdapterError> {
        let chr = find_characteristic_by_uuid(conn, characteristic)?;
        Ok(conn.write(&chr, bytes, write_type_for(chr.properties)).await?)
    }

    async fn list_services(&self, conn: &Peripheral) -> Result<Vec<ServiceInfo>, AdapterError> {
        Ok(conn
            .services()
            .into_iter()
            .map(|svc| ServiceInfo {
                uuid: svc.uuid,
                characteristics: svc
                    .characteristics
                    .iter()
                    .map(|c| CharacteristicInfo { uuid: c.uuid, properties: char_props(c.properties) })
                    .collect(),
            })
            .collect())
    }

    async fn disconnect(&self, conn: &Peripheral) -> Result<(), AdapterError> {
        if conn.is_connected().await? {
            conn.disconnect().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_write_with_response() {
        let both = CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE;
        assert!(matches!(write_type_for(both), WriteType::WithResponse));
        let wwr = CharPropFlags::WRITE_WITHOUT_RESPONSE;
        assert!(matches!(write_type_for(wwr), WriteType::WithoutResponse));
        assert!(matches!(write_type_for(CharPropFlags::empty()), WriteType::WithResponse));
    }

    fn handle(id: &str) -> DeviceHandle {
        DeviceHandle { id: id.into(), address: id.into(), name: None, services: vec![] }
    }

    #[test]
    fn vanished_peripheral_does_not_hide_the_rest() {
        let lookups: Vec<(String, Result<DeviceHandle, AdapterError>)> = vec![
            ("gone".to_string(), Err("Device not found".into())),
            ("target".to_string(), Ok(handle("target"))),
            ("late".to_string(), Ok(handle("late"))),
        ];
        let ids: Vec<String> = keep_resolved(lookups).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["target", "late"]);
    }

    #[test]
    fn maps_property_flags() {
        let props = char_props(CharPropFlags::READ | CharPropFlags::NOTIFY);
        assert!(props.read && props.notify);
        assert!(!props.write && !props.indicate && !props.write_without_response);
    }
}
