// src/db/fault.rs
// DOCUMENTATION: Classification of asynchronous connection faults
// PURPOSE: Publish transient pool faults on a typed channel and log them

use crate::errors::DriverErrorDetails;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::mysql::MySqlDatabaseError;
use std::io;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Transient pool fault
/// DOCUMENTATION: Closed set of classifications; none of them is fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolFault {
    /// Transport dropped; the connection is discarded and the next acquire reconnects
    ConnectionLost,
    /// Server unreachable; surfaces to the caller on the next acquire
    ConnectionRefused,
    /// Server-side connection cap reached; callers back off and retry
    ConnectionLimitExceeded,
}

impl PoolFault {
    /// Classify a driver error, returning `None` for errors that are not connection faults
    pub fn classify(err: &sqlx::Error) -> Option<Self> {
        match err {
            sqlx::Error::Io(io_err) => Self::from_io_kind(io_err.kind()),
            sqlx::Error::WorkerCrashed => Some(PoolFault::ConnectionLost),
            sqlx::Error::Database(db_err) => {
                let by_number = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .and_then(|e| Self::from_mysql_number(e.number()));
                by_number.or_else(|| {
                    db_err
                        .code()
                        .and_then(|state| Self::from_sql_state(state.as_ref()))
                })
            }
            _ => None,
        }
    }

    fn from_io_kind(kind: io::ErrorKind) -> Option<Self> {
        match kind {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => {
                Some(PoolFault::ConnectionRefused)
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut => Some(PoolFault::ConnectionLost),
            _ => None,
        }
    }

    fn from_mysql_number(number: u16) -> Option<Self> {
        match number {
            // ER_CON_COUNT_ERROR, ER_TOO_MANY_USER_CONNECTIONS
            1040 | 1203 => Some(PoolFault::ConnectionLimitExceeded),
            // ER_SERVER_SHUTDOWN
            1053 => Some(PoolFault::ConnectionLost),
            _ => None,
        }
    }

    fn from_sql_state(state: &str) -> Option<Self> {
        match state {
            "08004" => Some(PoolFault::ConnectionLimitExceeded),
            s if s.starts_with("08") => Some(PoolFault::ConnectionLost),
            _ => None,
        }
    }

    /// Symbolic code used in logs
    pub fn code(self) -> &'static str {
        match self {
            PoolFault::ConnectionLost => "PROTOCOL_CONNECTION_LOST",
            PoolFault::ConnectionRefused => "ECONNREFUSED",
            PoolFault::ConnectionLimitExceeded => "ER_CON_COUNT_ERROR",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PoolFault::ConnectionLost => "Database connection was closed.",
            PoolFault::ConnectionRefused => "Database connection was refused.",
            PoolFault::ConnectionLimitExceeded => "Database has too many connections.",
        }
    }

    /// Whether a connection that reported this fault must not be reused
    pub fn discards_connection(self) -> bool {
        !matches!(self, PoolFault::ConnectionLimitExceeded)
    }
}

/// A classified fault as published by the pool
#[derive(Debug, Clone, Serialize)]
pub struct FaultEvent {
    pub fault: PoolFault,
    pub details: DriverErrorDetails,
    pub occurred_at: DateTime<Utc>,
}

impl FaultEvent {
    pub fn new(fault: PoolFault, err: &sqlx::Error) -> Self {
        Self {
            fault,
            details: DriverErrorDetails::from_sqlx(err),
            occurred_at: Utc::now(),
        }
    }
}

/// Sending half of the fault channel
/// DOCUMENTATION: Shared by the pool, its acquire hook and every lease, so a fault is
/// published wherever the failing driver call happened
#[derive(Debug, Clone)]
pub struct FaultReporter {
    sender: broadcast::Sender<FaultEvent>,
}

impl FaultReporter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FaultEvent> {
        self.sender.subscribe()
    }

    /// Classify and publish a driver error; no subscribers is not an error
    pub fn report(&self, err: &sqlx::Error) -> Option<PoolFault> {
        let fault = PoolFault::classify(err)?;
        let _ = self.sender.send(FaultEvent::new(fault, err));
        Some(fault)
    }
}

/// Spawn the standing fault listener
/// DOCUMENTATION: Runs until the pool (and with it the sender) is dropped
pub fn spawn_fault_listener(mut events: broadcast::Receiver<FaultEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_fault(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Fault listener lagged, skipped {} pool events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    log::debug!("Fault channel closed, listener stopping");
                    break;
                }
            }
        }
    })
}

fn log_fault(event: &FaultEvent) {
    log::error!(
        "Database pool error [{}]: {}",
        event.fault.code(),
        event.details
    );
    match event.fault {
        PoolFault::ConnectionLost | PoolFault::ConnectionRefused => {
            log::warn!("{} Reconnecting on next acquire.", event.fault.description());
        }
        PoolFault::ConnectionLimitExceeded => {
            log::warn!("{} Callers should back off and retry.", event.fault.description());
        }
    }
}
