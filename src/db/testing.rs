// src/db/testing.rs
// In-memory stand-in for a MySQL server used by unit tests, plus network endpoints
// for exercising the real sqlx pool without a database

use crate::db::connection::{Connector, ManagedConnection};
use sqlx::mysql::MySqlConnectOptions;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Server-side database error carrying only a SQLSTATE
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct FakeDatabaseError {
    sql_state: String,
    message: String,
}

impl sqlx::error::DatabaseError for FakeDatabaseError {
    fn message(&self) -> &str {
        &self.message
    }

    fn code(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(&self.sql_state))
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::Other
    }
}

pub(crate) fn database_error(sql_state: &str, message: &str) -> sqlx::Error {
    sqlx::Error::Database(Box::new(FakeDatabaseError {
        sql_state: sql_state.to_string(),
        message: message.to_string(),
    }))
}

/// Connect options for a local port nothing listens on
pub(crate) fn refused_connect_options() -> MySqlConnectOptions {
    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .unwrap()
        .port();
    local_options(port)
}

/// Connect options for the server named by DATABASE_URL
pub(crate) fn live_connect_options() -> MySqlConnectOptions {
    std::env::var("DATABASE_URL")
        .expect("DATABASE_URL required")
        .parse()
        .expect("DATABASE_URL must be a mysql:// URL")
}

fn local_options(port: u16) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host("127.0.0.1")
        .port(port)
        .username("root")
        .password("root")
}

/// Accepts TCP connections but never sends the MySQL greeting
pub(crate) struct SilentServer {
    listener: TcpListener,
}

impl SilentServer {
    pub fn start() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").unwrap(),
        }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        local_options(self.port())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectFailure {
    Refused,
    AccessDenied,
}

impl ConnectFailure {
    fn to_error(self) -> sqlx::Error {
        match self {
            ConnectFailure::Refused => sqlx::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connect ECONNREFUSED 127.0.0.1:3306",
            )),
            ConnectFailure::AccessDenied => {
                database_error("28000", "Access denied for user 'root'@'localhost'")
            }
        }
    }
}

/// Databases and tables known to the fake server
#[derive(Debug, Default)]
pub(crate) struct FakeSchema {
    /// database -> table -> unique `name` values inserted so far
    pub databases: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl FakeSchema {
    pub fn tables(&self, database: &str) -> Vec<String> {
        self.databases
            .get(database)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rows(&self, database: &str, table: &str) -> Vec<String> {
        self.databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .map(|rows| rows.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct FakeState {
    connects: AtomicUsize,
    live: AtomicUsize,
    closed: AtomicUsize,
    connect_failure: Mutex<Option<ConnectFailure>>,
    fail_statement: Mutex<Option<String>>,
    schema: Mutex<FakeSchema>,
    log: Mutex<Vec<String>>,
}

/// Connector handing out in-memory connections that share one fake server
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn fail_connects(&self, failure: Option<ConnectFailure>) {
        *self.state.connect_failure.lock().unwrap() = failure;
    }

    /// Fail any statement containing `fragment`
    pub fn fail_statements_containing(&self, fragment: &str) {
        *self.state.fail_statement.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn schema<T>(&self, inspect: impl FnOnce(&FakeSchema) -> T) -> T {
        inspect(&self.state.schema.lock().unwrap())
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.log.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, sqlx::Error> {
        if let Some(failure) = *self.state.connect_failure.lock().unwrap() {
            return Err(failure.to_error());
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_add(1, Ordering::SeqCst);

        Ok(FakeConnection {
            state: Arc::clone(&self.state),
            database: None,
        })
    }
}

pub(crate) struct FakeConnection {
    state: Arc<FakeState>,
    database: Option<String>,
}

impl FakeConnection {
    fn run(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        self.state.log.lock().unwrap().push(sql.to_string());

        if let Some(fragment) = self.state.fail_statement.lock().unwrap().as_deref() {
            if sql.contains(fragment) {
                return Err(database_error("42000", "access denied for this statement"));
            }
        }

        let sql = sql.trim();
        if sql == "SELECT 1" {
            return Ok(1);
        }

        let mut schema = self.state.schema.lock().unwrap();
        if let Some(rest) = sql.strip_prefix("CREATE DATABASE IF NOT EXISTS ") {
            let name = unquote(rest);
            let created = !schema.databases.contains_key(&name);
            schema.databases.entry(name).or_default();
            return Ok(created as u64);
        }
        if let Some(rest) = sql.strip_prefix("USE ") {
            let name = unquote(rest);
            if !schema.databases.contains_key(&name) {
                return Err(database_error("42000", "Unknown database"));
            }
            self.database = Some(name);
            return Ok(0);
        }

        let database = self
            .database
            .clone()
            .ok_or_else(|| database_error("3D000", "No database selected"))?;
        let tables = schema.databases.entry(database).or_default();

        if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
            let name = first_word(rest);
            for referenced in rest.split("REFERENCES ").skip(1) {
                let target = referenced.split('(').next().unwrap_or_default().trim();
                if !tables.contains_key(target) {
                    return Err(database_error(
                        "HY000",
                        "Failed to open the referenced table",
                    ));
                }
            }
            let created = !tables.contains_key(&name);
            tables.entry(name).or_default();
            return Ok(created as u64);
        }
        if let Some(rest) = sql.strip_prefix("INSERT IGNORE INTO ") {
            let name = first_word(rest);
            let value = rest.split('\'').nth(1).unwrap_or_default().to_string();
            let rows = tables
                .get_mut(&name)
                .ok_or_else(|| database_error("42S02", "Table doesn't exist"))?;
            return Ok(rows.insert(value) as u64);
        }

        Err(database_error("42000", "You have an error in your SQL syntax"))
    }
}

fn unquote(identifier: &str) -> String {
    identifier.trim().trim_matches('`').replace("``", "`")
}

fn first_word(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl ManagedConnection for FakeConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        self.run(sql)
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}
