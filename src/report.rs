//! Session events and the sinks that receive them.

use crate::adapter::{DeviceHandle, ServiceInfo};
use crate::error::TransferOp;

use log::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ScanStarted { target: String },
    DeviceSeen(DeviceHandle),
    TargetFound(DeviceHandle),
    Connected(DeviceHandle),
    Sent { characteristic: Uuid, payload: Vec<u8> },
    Received { characteristic: Uuid, text: String },
    Service(ServiceInfo),
    InvalidInput(String),
    TransferFailed { op: TransferOp, reason: String },
    Heartbeat,
    Interrupted,
    Disconnected(DeviceHandle),
}

/// Receives everything a session wants to tell the user.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Writes events as log lines.
pub struct LogReporter;

fn describe_payload(payload: &[u8]) -> String {
    match payload {
        b"1" => "ON".to_string(),
        b"0" => "OFF".to_string(),
        _ => format!("{:?}", String::from_utf8_lossy(payload)),
    }
}

impl Reporter for LogReporter {
    fn report(&self, event: Event) {
        match event {
            Event::ScanStarted { target } => info!("Starting BLE scan for {}...", target),
            Event::DeviceSeen(dev) => info!("Found device: {}", dev),
            Event::TargetFound(dev) => info!("Found target device: {}", dev),
            Event::Connected(dev) => info!("Connected: {}", dev),
            Event::Sent { characteristic, payload } => {
                info!("Sent command: {} -> {}", describe_payload(&payload), characteristic)
            }
            Event::Received { characteristic, text } => info!("Read {}: {}", characteristic, text),
            Event::Service(svc) => {
                info!("Service: {}", svc.uuid);
                for chr in &svc.characteristics {
                    info!("  Characteristic: {} [{}]", chr.uuid, chr.properties);
                }
            }
            Event::InvalidInput(input) => warn!("Invalid command {:?}! Use 0 or 1", input),
            Event::TransferFailed { op, reason } => error!("{} failed: {}", op, reason),
            Event::Heartbeat => debug!("idle"),
            Event::Interrupted => info!("Interrupted by user"),
            Event::Disconnected(dev) => info!("Disconnected from {}", dev),
        }
    }
}

#[cfg(test)]
pub mod recording {
    use super::{Event, Reporter};
    use std::sync::{Arc, Mutex};

    /// Keeps every reported event for later assertions.
    #[derive(Clone, Default)]
    pub struct RecordingReporter {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl RecordingReporter {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Reporter for RecordingReporter {
        fn report(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }
}
