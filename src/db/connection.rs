// src/db/connection.rs
// DOCUMENTATION: Seams between the schema bootstrapper and the database driver
// PURPOSE: Run bootstrap over any connection that can execute and close

use std::future::Future;

/// A single live database connection
pub trait ManagedConnection: Send + 'static {
    /// Run one statement over the text protocol, returning rows affected
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    /// Graceful shutdown of the connection
    fn close(self) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

/// Opens new connections on demand
pub trait Connector: Send + Sync + 'static {
    type Connection: ManagedConnection;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, sqlx::Error>> + Send;
}
