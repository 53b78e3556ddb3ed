// src/db/mod.rs
// DOCUMENTATION: Database module organization
// PURPOSE: Re-export pool, fault, schema and health components

pub mod connection;
pub mod fault;
pub mod health;
pub mod mysql;
pub mod pool;
pub mod retry;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Connector, ManagedConnection};
pub use fault::{spawn_fault_listener, FaultEvent, FaultReporter, PoolFault};
pub use mysql::MySqlConnector;
pub use pool::{ConnectionPool, PoolOptions, PoolStatus, PooledConnection, UnitOfWork};
pub use retry::{with_backoff, BackoffPolicy};
