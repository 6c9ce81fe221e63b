use crate::adapter::AdapterError;

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Read(Uuid),
    Write(Uuid),
    ListServices,
}

impl std::fmt::Display for TransferOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferOp::Read(uuid) => write!(f, "read of {}", uuid),
            TransferOp::Write(uuid) => write!(f, "write to {}", uuid),
            TransferOp::ListServices => write!(f, "service listing"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no device matching {target} among {scanned} scanned device(s)")]
    NotFound { target: String, scanned: usize },

    #[error("could not connect to {device}")]
    Connect {
        device: String,
        #[source]
        source: AdapterError,
    },

    #[error("{op} failed")]
    Transfer {
        op: TransferOp,
        #[source]
        source: AdapterError,
    },

    #[error("invalid command {0:?}, use 0 or 1 (q to quit)")]
    InvalidInput(String),

    #[error("no active session")]
    NotConnected,

    #[error("adapter failure during {0}")]
    Adapter(&'static str, #[source] AdapterError),
}

impl SessionError {
    pub fn transfer(op: TransferOp, source: impl Into<AdapterError>) -> Self {
        SessionError::Transfer { op, source: source.into() }
    }

    pub fn op_timeout(op: TransferOp, after: Duration) -> Self {
        Self::transfer(op, format!("timed out after {:?}", after))
    }

    /// The error followed by each of its sources, `": "`-separated.
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionError::NotFound { .. } => 2,
            SessionError::Connect { .. } => 3,
            SessionError::Transfer { .. } => 4,
            _ => 1,
        }
    }
}
