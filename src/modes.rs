//! The interaction loops run while a session is connected.

use crate::adapter::device_uuids::TEMP_CHAR_UUID;
use crate::adapter::BleAdapter;
use crate::config::Mode;
use crate::error::{SessionError, TransferOp};
use crate::input::{parse_command, CommandSource, Prompted};
use crate::report::Event;
use crate::session::{Controller, Outcome, Session};

use std::time::Duration;

use chrono::{DateTime, Local};
use log::info;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Text shown for a value read from `characteristic`.
fn decode_value(characteristic: Uuid, bytes: &[u8]) -> String {
    match bytes {
        // the firmware narrows a signed centidegree value into two u8s, so
        // sub-zero readings arrive out of range and are shown raw
        [whole, hundredths] if characteristic == TEMP_CHAR_UUID && *whole <= 127 && *hundredths <= 99 => {
            format!("{}.{:02} °C", whole, hundredths)
        }
        _ if characteristic == TEMP_CHAR_UUID => format!("raw {:02x?}", bytes),
        // the reference firmware serves its greeting with the C terminator
        _ => String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
    }
}

fn timestamped(message: &str, at: DateTime<Local>) -> String {
    format!("{} {}", message, at.format(TIMESTAMP_FORMAT))
}

impl<A: BleAdapter> Controller<A> {
    pub(crate) async fn interact<I: CommandSource>(
        &self,
        mode: &Mode,
        session: &Session<A::Connection>,
        input: &mut I,
    ) -> Result<Outcome, SessionError> {
        info!("running {:?} against {}", mode, session.device());
        match mode {
            Mode::CommandRelay => self.command_relay(session, input).await,
            Mode::PassiveRead { heartbeat } => self.passive_read(session, *heartbeat).await,
            Mode::PeriodicWrite { interval, message } => self.periodic_write(session, *interval, message).await,
            Mode::Introspect => self.introspect(session).await,
        }
    }

    async fn command_relay<I: CommandSource>(
        &self,
        session: &Session<A::Connection>,
        input: &mut I,
    ) -> Result<Outcome, SessionError> {
        loop {
            let line = match input.next_line().await {
                Prompted::Line(line) => line,
                Prompted::Interrupted => {
                    self.reporter.report(Event::Interrupted);
                    return Ok(Outcome::Interrupted);
                }
                Prompted::Closed => return Ok(Outcome::Quit),
            };
            match parse_command(&line) {
                Ok(cmd) => match cmd.payload() {
                    Some(payload) => self.tolerate(self.write(session, payload).await)?,
                    None => return Ok(Outcome::Quit),
                },
                Err(SessionError::InvalidInput(text)) => self.reporter.report(Event::InvalidInput(text)),
                Err(err) => return Err(err),
            }
        }
    }

    /// One read, then idles until interrupted. A failed read is always fatal.
    async fn passive_read(
        &self,
        session: &Session<A::Connection>,
        heartbeat: Duration,
    ) -> Result<Outcome, SessionError> {
        let characteristic = self.config.characteristic;
        let bytes = self.read(session).await?;
        self.reporter.report(Event::Received {
            characteristic,
            text: decode_value(characteristic, &bytes),
        });

        let mut ticker = interval(heartbeat);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.reporter.report(Event::Heartbeat);
        }
    }

    async fn periodic_write(
        &self,
        session: &Session<A::Connection>,
        period: Duration,
        message: &str,
    ) -> Result<Outcome, SessionError> {
        // wall clock is read once and advanced by the runtime's monotonic
        // clock, so stamps strictly increase even if the system time jumps
        let wall_start = Local::now();
        let start = Instant::now();

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let elapsed = chrono::Duration::from_std(start.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
            let text = timestamped(message, wall_start + elapsed);
            self.tolerate(self.write(session, text.as_bytes()).await)?;
        }
    }

    async fn introspect(&self, session: &Session<A::Connection>) -> Result<Outcome, SessionError> {
        let connection = session.connection()?;
        let op = TransferOp::ListServices;
        let services = match timeout(self.config.op_timeout, self.adapter.list_services(connection)).await {
            Ok(Ok(services)) => services,
            Ok(Err(source)) => return Err(SessionError::transfer(op, source)),
            Err(_) => return Err(SessionError::op_timeout(op, self.config.op_timeout)),
        };
        info!("{} exposes {} service(s)", session.device(), services.len());
        for service in services {
            self.reporter.report(Event::Service(service));
        }
        Ok(Outcome::Completed)
    }
}
