use crate::adapter::{BleAdapter, DeviceHandle};
use crate::config::{Mode, SessionConfig, TransferPolicy};
use crate::error::{SessionError, TransferOp};
use crate::input::CommandSource;
use crate::report::{Event, Reporter};

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use tokio::time::timeout;

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// User typed the quit command or closed the input
    Quit,
    /// Ctrl-C or another external interrupt
    Interrupted,
    /// The mode ran to completion on its own
    Completed,
}

/// The one live connection of a run.
///
/// Holds the adapter connection until `Controller::close_session` takes it.
pub struct Session<C> {
    device: DeviceHandle,
    connection: Option<C>,
}

impl<C> Session<C> {
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn connection(&self) -> Result<&C, SessionError> {
        self.connection.as_ref().ok_or(SessionError::NotConnected)
    }
}

impl<C> Drop for Session<C> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!("session with {} dropped without disconnecting", self.device);
        }
    }
}

/// Drives one scan -> connect -> interact -> disconnect cycle.
pub struct Controller<A: BleAdapter> {
    pub(crate) adapter: A,
    pub(crate) config: SessionConfig,
    pub(crate) reporter: Arc<dyn Reporter>,
}

impl<A: BleAdapter> Controller<A> {
    pub fn new(adapter: A, config: SessionConfig, reporter: Arc<dyn Reporter>) -> Self {
        Controller { adapter, config, reporter }
    }

    /// First device in scan order that matches the configured target.
    pub async fn find_target(&self) -> Result<DeviceHandle, SessionError> {
        let target = &self.config.target;
        self.reporter.report(Event::ScanStarted { target: target.to_string() });

        let devices = self
            .adapter
            .scan(self.config.scan_window)
            .await
            .map_err(|e| SessionError::Adapter("scan", e))?;

        let mut found = None;
        for device in &devices {
            self.reporter.report(Event::DeviceSeen(device.clone()));
            if found.is_none() && target.matches(device) {
                found = Some(device.clone());
            }
        }

        match found {
            Some(device) => {
                self.reporter.report(Event::TargetFound(device.clone()));
                Ok(device)
            }
            None => Err(SessionError::NotFound {
                target: target.to_string(),
                scanned: devices.len(),
            }),
        }
    }

    pub async fn open_session(&self, device: DeviceHandle) -> Result<Session<A::Connection>, SessionError> {
        let limit = self.config.connect_timeout;
        match timeout(limit, self.adapter.connect(&device)).await {
            Ok(Ok(connection)) => {
                self.reporter.report(Event::Connected(device.clone()));
                Ok(Session { device, connection: Some(connection) })
            }
            Ok(Err(source)) => Err(SessionError::Connect { device: device.to_string(), source }),
            Err(_) => Err(SessionError::Connect {
                device: device.to_string(),
                source: format!("timed out after {:?}", limit).into(),
            }),
        }
    }

    /// Releases the connection. Safe to call any number of times; only the
    /// first call reaches the adapter.
    pub async fn close_session(&self, session: &mut Session<A::Connection>) {
        let Some(connection) = session.connection.take() else {
            debug!("session with {} already closed", session.device);
            return;
        };
        match timeout(self.config.connect_timeout, self.adapter.disconnect(&connection)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("disconnect from {} failed: {}", session.device, err),
            Err(_) => warn!("disconnect from {} timed out", session.device),
        }
        self.reporter.report(Event::Disconnected(session.device.clone()));
    }

    pub async fn read(&self, session: &Session<A::Connection>) -> Result<Vec<u8>, SessionError> {
        let connection = session.connection()?;
        let op = TransferOp::Read(self.config.characteristic);
        match timeout(self.config.op_timeout, self.adapter.read(connection, self.config.characteristic)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(source)) => Err(SessionError::transfer(op, source)),
            Err(_) => Err(SessionError::op_timeout(op, self.config.op_timeout)),
        }
    }

    pub async fn write(&self, session: &Session<A::Connection>, payload: &[u8]) -> Result<(), SessionError> {
        let connection = session.connection()?;
        let characteristic = self.config.characteristic;
        let op = TransferOp::Write(characteristic);
        match timeout(self.config.op_timeout, self.adapter.write(connection, characteristic, payload)).await {
            Ok(Ok(())) => {
                self.reporter.report(Event::Sent { characteristic, payload: payload.to_vec() });
                Ok(())
            }
            Ok(Err(source)) => Err(SessionError::transfer(op, source)),
            Err(_) => Err(SessionError::op_timeout(op, self.config.op_timeout)),
        }
    }

    /// Applies the transfer-error policy to the result of a write.
    pub(crate) fn tolerate(&self, result: Result<(), SessionError>) -> Result<(), SessionError> {
        match result {
            Err(SessionError::Transfer { op, source }) if self.config.on_transfer_error == TransferPolicy::Continue => {
                let reason = SessionError::Transfer { op, source }.describe();
                self.reporter.report(Event::TransferFailed { op, reason });
                Ok(())
            }
            other => other,
        }
    }

    /// Runs the whole cycle. `shutdown` resolving counts as an interrupt: the
    /// current phase is abandoned and any open session is closed.
    pub async fn run<I, F>(&self, mode: &Mode, input: &mut I, shutdown: F) -> Result<Outcome, SessionError>
    where
        I: CommandSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let device = tokio::select! {
            found = self.find_target() => found?,
            _ = &mut shutdown => {
                self.reporter.report(Event::Interrupted);
                return Ok(Outcome::Interrupted);
            }
        };

        let mut session = self.open_session(device).await?;

        let result = tokio::select! {
            res = self.interact(mode, &session, input) => res,
            _ = &mut shutdown => {
                self.reporter.report(Event::Interrupted);
                Ok(Outcome::Interrupted)
            }
        };

        self.close_session(&mut session).await;
        debug_assert!(!session.is_open());
        result
    }
}
