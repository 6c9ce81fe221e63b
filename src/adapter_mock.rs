use crate::adapter::{AdapterError, BleAdapter, DeviceHandle, ServiceInfo};

use std::future::pending;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

/// Adapter call as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Scan,
    Connect(String),
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    ListServices,
    Disconnect(u32),
}

#[derive(Default)]
pub(crate) struct State {
    ops: Vec<Op>,
    next_conn: u32,
}

/// In-memory adapter that records every call.
#[derive(Clone, Default)]
pub struct MockAdapter {
    pub devices: Vec<DeviceHandle>,
    pub services: Vec<ServiceInfo>,
    pub read_value: Option<Vec<u8>>,
    pub refuse_connect: bool,
    pub fail_writes: bool,
    pub fail_list: bool,
    /// Never answer scan requests
    pub hang_scan: bool,
    /// Never answer connect requests
    pub hang_connect: bool,
    /// Never answer reads, writes or service listings
    pub hang_transfers: bool,
    pub(crate) state: Arc<Mutex<State>>,
}

#[derive(Debug)]
pub struct MockConnection(pub u32);

pub fn device(id: &str, name: Option<&str>, services: &[Uuid]) -> DeviceHandle {
    DeviceHandle {
        id: id.to_string(),
        address: format!("AA:BB:CC:DD:EE:{}", id),
        name: name.map(str::to_string),
        services: services.to_vec(),
    }
}

impl MockAdapter {
    pub fn with_devices(devices: Vec<DeviceHandle>) -> Self {
        MockAdapter { devices, ..Default::default() }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Write(_, bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn disconnects(&self) -> usize {
        self.ops().iter().filter(|op| matches!(op, Op::Disconnect(_))).count()
    }

    fn record(&self, op: Op) {
        self.state.lock().unwrap().ops.push(op);
    }

    async fn stall_if(&self, hang: bool) {
        if hang {
            pending::<()>().await;
        }
    }
}

#[async_trait]
impl BleAdapter for MockAdapter {
    type Connection = MockConnection;

    async fn scan(&self, _duration: Duration) -> Result<Vec<DeviceHandle>, AdapterError> {
        self.record(Op::Scan);
        self.stall_if(self.hang_scan).await;
        Ok(self.devices.clone())
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<MockConnection, AdapterError> {
        self.record(Op::Connect(device.id.clone()));
        self.stall_if(self.hang_connect).await;
        if self.refuse_connect {
            return Err("connection refused".into());
        }
        let mut state = self.state.lock().unwrap();
        state.next_conn += 1;
        Ok(MockConnection(state.next_conn))
    }

    async fn read(&self, _conn: &MockConnection, characteristic: Uuid) -> Result<Vec<u8>, AdapterError> {
        self.record(Op::Read(characteristic));
        self.stall_if(self.hang_transfers).await;
        self.read_value.clone().ok_or_else(|| "read not permitted".into())
    }

    async fn write(&self, _conn: &MockConnection, characteristic: Uuid, bytes: &[u8]) -> Result<(), AdapterError> {
        self.record(Op::Write(characteristic, bytes.to_vec()));
        self.stall_if(self.hang_transfers).await;
        if self.fail_writes {
            return Err("write rejected".into());
        }
        Ok(())
    }

    async fn list_services(&self, _conn: &MockConnection) -> Result<Vec<ServiceInfo>, AdapterError> {
        self.record(Op::ListServices);
        self.stall_if(self.hang_transfers).await;
        if self.fail_list {
            return Err("service discovery failed".into());
        }
        Ok(self.services.clone())
    }

    async fn disconnect(&self, conn: &MockConnection) -> Result<(), AdapterError> {
        self.record(Op::Disconnect(conn.0));
        Ok(())
    }
}
