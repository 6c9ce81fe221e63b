use crate::adapter::device_uuids::{ADVERTISED_SVC_UUID, CONTROL_CHAR_UUID};
use crate::adapter::DeviceHandle;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// What to look for while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDescriptor {
    /// Matches any device advertising this service
    Service(Uuid),
    /// Matches the advertised local name exactly
    Name(String),
}

impl TargetDescriptor {
    pub fn matches(&self, device: &DeviceHandle) -> bool {
        match self {
            // parsed UUIDs compare by value, so textual case never matters
            TargetDescriptor::Service(uuid) => device.services.contains(uuid),
            TargetDescriptor::Name(name) => device.name.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetDescriptor::Service(uuid) => write!(f, "service {}", uuid),
            TargetDescriptor::Name(name) => write!(f, "name {:?}", name),
        }
    }
}

/// What to do when a read or write fails mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransferPolicy {
    /// End the session with an error
    Abort,
    /// Report the failure and keep going
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    CommandRelay,
    PassiveRead { heartbeat: Duration },
    PeriodicWrite { interval: Duration, message: String },
    Introspect,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub target: TargetDescriptor,
    pub characteristic: Uuid,
    pub scan_window: Duration,
    pub connect_timeout: Duration,
    pub op_timeout: Duration,
    pub on_transfer_error: TransferPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            target: TargetDescriptor::Service(ADVERTISED_SVC_UUID),
            characteristic: CONTROL_CHAR_UUID,
            scan_window: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            op_timeout: Duration::from_millis(2000),
            on_transfer_error: TransferPolicy::Abort,
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Scan for a BLE peripheral, connect, and talk to one characteristic", long_about = None)]
pub struct Args {
    /// Advertised service UUID to look for (default: the reference device's)
    #[arg(short = 's', long = "service", env = "BLELINK_SERVICE", conflicts_with = "name")]
    pub service: Option<Uuid>,
    /// Exact advertised device name to look for
    #[arg(short = 'n', long = "name", env = "BLELINK_NAME")]
    pub name: Option<String>,
    /// Characteristic used for reads and writes
    #[arg(short = 'c', long = "characteristic", env = "BLELINK_CHARACTERISTIC", default_value_t = CONTROL_CHAR_UUID)]
    pub characteristic: Uuid,
    #[arg(long, env = "BLELINK_SCAN_SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub scan_secs: u64,
    #[arg(long, env = "BLELINK_CONNECT_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout_secs: u64,
    /// Timeout for each read, write or service listing
    #[arg(long, env = "BLELINK_OP_TIMEOUT_MS", default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub op_timeout_ms: u64,
    #[arg(long, env = "BLELINK_ON_TRANSFER_ERROR", value_enum, default_value_t = TransferPolicy::Abort)]
    pub on_transfer_error: TransferPolicy,
    /// Also write the log to this file
    #[arg(long, env = "BLELINK_LOG_FILE")]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub mode: ModeArgs,
}

#[derive(Debug, Subcommand)]
pub enum ModeArgs {
    /// Send 0/1 typed at the prompt, q to quit
    Relay,
    /// Read the characteristic once, then idle until Ctrl-C
    Read {
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        heartbeat_secs: u64,
    },
    /// Write a timestamped message at a fixed interval until Ctrl-C
    Periodic {
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: u64,
        #[arg(long, default_value = "Hello from host")]
        message: String,
    },
    /// List services and characteristics, then exit
    Introspect,
}

impl Args {
    pub fn target(&self) -> TargetDescriptor {
        match (&self.service, &self.name) {
            (_, Some(name)) => TargetDescriptor::Name(name.clone()),
            (Some(uuid), None) => TargetDescriptor::Service(*uuid),
            (None, None) => TargetDescriptor::Service(ADVERTISED_SVC_UUID),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            target: self.target(),
            characteristic: self.characteristic,
            scan_window: Duration::from_secs(self.scan_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
            on_transfer_error: self.on_transfer_error,
        }
    }

    pub fn mode(&self) -> Mode {
        match &self.mode {
            ModeArgs::Relay => Mode::CommandRelay,
            ModeArgs::Read { heartbeat_secs } => Mode::PassiveRead {
                heartbeat: Duration::from_secs(*heartbeat_secs),
            },
            ModeArgs::Periodic { interval_secs, message } => Mode::PeriodicWrite {
                interval: Duration::from_secs(*interval_secs),
                message: message.clone(),
            },
            ModeArgs::Introspect => Mode::Introspect,
        }
    }
}
