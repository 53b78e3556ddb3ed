// src/db/mysql.rs
// DOCUMENTATION: sqlx MySQL implementation of the connection seams
// PURPOSE: Open standalone MySqlConnection handles for the schema bootstrapper

use crate::db::connection::{Connector, ManagedConnection};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::Connection as _;

/// Opens MySQL connections with fixed connect options, outside any pool
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    pub fn new(options: MySqlConnectOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MySqlConnectOptions {
        &self.options
    }
}

impl Connector for MySqlConnector {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, sqlx::Error> {
        MySqlConnection::connect_with(&self.options).await
    }
}

impl ManagedConnection for MySqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        // A bare &str carries no arguments, so sqlx sends it over the text protocol.
        // USE and other non-preparable statements depend on that.
        let done = sqlx::Executor::execute(&mut *self, sql).await?;
        Ok(done.rows_affected())
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        sqlx::Connection::close(self).await
    }
}
