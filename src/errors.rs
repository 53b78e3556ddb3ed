// src/errors.rs
// DOCUMENTATION: Error taxonomy for the database lifecycle and HTTP responses
// PURPOSE: Centralized error handling for entire application

use crate::db::fault::PoolFault;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use serde_json::json;
use sqlx::mysql::MySqlDatabaseError;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Driver-level details of a database failure
/// DOCUMENTATION: Flattened view of a sqlx error for operator diagnostics
/// `code` is the symbolic MySQL / socket error name (e.g. ER_CON_COUNT_ERROR, ECONNREFUSED)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverErrorDetails {
    pub code: Option<String>,
    pub errno: Option<u16>,
    pub sql_state: Option<String>,
    pub message: String,
}

impl DriverErrorDetails {
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let errno = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| e.number());
                Self {
                    code: errno.map(mysql_error_name),
                    errno,
                    sql_state: db_err.code().map(|c| c.into_owned()),
                    message: db_err.message().to_string(),
                }
            }
            sqlx::Error::Io(io_err) => Self {
                code: Some(io_error_code(io_err.kind()).to_string()),
                errno: io_err.raw_os_error().and_then(|n| u16::try_from(n).ok()),
                sql_state: None,
                message: io_err.to_string(),
            },
            other => Self {
                message: other.to_string(),
                ..Self::default()
            },
        }
    }
}

impl fmt::Display for DriverErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "code={} errno={} sqlState={} message={}",
            self.code.as_deref().unwrap_or("-"),
            self.errno.map_or_else(|| "-".to_string(), |n| n.to_string()),
            self.sql_state.as_deref().unwrap_or("-"),
            self.message
        )
    }
}

fn mysql_error_name(number: u16) -> String {
    let name = match number {
        1040 => "ER_CON_COUNT_ERROR",
        1044 => "ER_DBACCESS_DENIED_ERROR",
        1045 => "ER_ACCESS_DENIED_ERROR",
        1049 => "ER_BAD_DB_ERROR",
        1053 => "ER_SERVER_SHUTDOWN",
        1064 => "ER_PARSE_ERROR",
        1142 => "ER_TABLEACCESS_DENIED_ERROR",
        1203 => "ER_TOO_MANY_USER_CONNECTIONS",
        1215 => "ER_CANNOT_ADD_FOREIGN",
        other => return format!("ER_{}", other),
    };
    name.to_string()
}

fn io_error_code(kind: io::ErrorKind) -> &'static str {
    match kind {
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::ConnectionReset => "ECONNRESET",
        io::ErrorKind::ConnectionAborted => "ECONNABORTED",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        io::ErrorKind::BrokenPipe => "EPIPE",
        io::ErrorKind::NotConnected => "ENOTCONN",
        io::ErrorKind::AddrNotAvailable => "EADDRNOTAVAIL",
        io::ErrorKind::UnexpectedEof => "PROTOCOL_CONNECTION_LOST",
        _ => "EIO",
    }
}

/// Missing or invalid startup configuration
/// DOCUMENTATION: Fatal; the process must exit before opening any network resource
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", describe_config_problems(.missing, .invalid))]
pub struct ConfigError {
    /// Required keys that were unset or empty, in declaration order
    pub missing: Vec<&'static str>,
    /// Keys whose value could not be used, with the reason
    pub invalid: Vec<(&'static str, String)>,
}

impl ConfigError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.invalid.is_empty()
    }
}

fn describe_config_problems(missing: &[&str], invalid: &[(&str, String)]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!(
            "missing required environment variables: {}",
            missing.join(", ")
        ));
    }
    if !invalid.is_empty() {
        let invalid: Vec<String> = invalid
            .iter()
            .map(|(key, reason)| format!("{} ({})", key, reason))
            .collect();
        parts.push(format!("invalid environment variables: {}", invalid.join(", ")));
    }
    parts.join("; ")
}

/// Failures while leasing or using a pooled connection
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to open database connection: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("timed out after {0:?} waiting for a pooled connection")]
    Timeout(Duration),

    #[error("connection pool is closed")]
    Closed,
}

impl PoolError {
    /// Underlying driver error, if any
    pub fn driver_error(&self) -> Option<&sqlx::Error> {
        match self {
            PoolError::Connect(err) | PoolError::Query(err) => Some(err),
            PoolError::Timeout(_) | PoolError::Closed => None,
        }
    }

    /// Transient fault classification of the underlying driver error
    pub fn fault(&self) -> Option<PoolFault> {
        self.driver_error().and_then(PoolFault::classify)
    }
}

/// Startup connectivity probe failure
/// DOCUMENTATION: Fatal at startup; carries driver details for the operator
#[derive(Error, Debug)]
#[error("database connectivity check failed: {details}")]
pub struct ConnectivityError {
    pub details: DriverErrorDetails,
    #[source]
    pub source: PoolError,
}

impl ConnectivityError {
    /// Symbolic driver error code (ECONNREFUSED, ER_ACCESS_DENIED_ERROR, ...)
    pub fn code(&self) -> Option<&str> {
        self.details.code.as_deref()
    }
}

impl From<PoolError> for ConnectivityError {
    fn from(source: PoolError) -> Self {
        let details = match source.driver_error() {
            Some(err) => DriverErrorDetails::from_sqlx(err),
            None => DriverErrorDetails {
                message: source.to_string(),
                ..DriverErrorDetails::default()
            },
        };
        ConnectivityError { details, source }
    }
}

/// Fatal startup failure of the service binary
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to database: {0}")]
    Database(#[from] ConnectivityError),
}

/// Steps of the schema bootstrap sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStep {
    CreateDatabase,
    UseDatabase,
    CreateTable(&'static str),
    Seed(&'static str),
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapStep::CreateDatabase => f.write_str("create database"),
            BootstrapStep::UseDatabase => f.write_str("use database"),
            BootstrapStep::CreateTable(table) => write!(f, "create table {}", table),
            BootstrapStep::Seed(table) => write!(f, "seed {}", table),
        }
    }
}

/// Schema bootstrap failure
/// DOCUMENTATION: Already-applied steps stay applied; every step is idempotent so the
/// whole bootstrap can simply be re-run
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("invalid database name {0:?}: expected 1-64 characters of [A-Za-z0-9_$], not all digits")]
    InvalidDatabaseName(String),

    #[error("failed to open bootstrap connection: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("bootstrap step '{step}' failed: {source}")]
    Step {
        step: BootstrapStep,
        #[source]
        source: sqlx::Error,
    },
}

impl BootstrapError {
    pub fn step(&self) -> Option<BootstrapStep> {
        match self {
            BootstrapError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn driver_details(&self) -> Option<DriverErrorDetails> {
        match self {
            BootstrapError::Connect(err) | BootstrapError::Step { source: err, .. } => {
                Some(DriverErrorDetails::from_sqlx(err))
            }
            BootstrapError::InvalidDatabaseName(_) => None,
        }
    }
}

/// Errors surfaced over HTTP
/// DOCUMENTATION: Each variant maps to appropriate HTTP status code and error response
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Query(_) => ApiError::DatabaseError(err.to_string()),
            PoolError::Connect(_) | PoolError::Timeout(_) | PoolError::Closed => {
                ApiError::DatabaseUnavailable(err.to_string())
            }
        }
    }
}

/// Convert ApiError to HTTP response
impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_code = match self {
            ApiError::DatabaseUnavailable(_) => "DATABASE_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
        };

        let body = json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        });

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_every_key() {
        let err = ConfigError {
            missing: vec!["DB_HOST", "YOUTUBE_API_KEY"],
            invalid: vec![("DB_PORT", "must be a port number".to_string())],
        };
        assert_eq!(
            err.to_string(),
            "missing required environment variables: DB_HOST, YOUTUBE_API_KEY; \
             invalid environment variables: DB_PORT (must be a port number)"
        );

        let only_invalid = ConfigError {
            invalid: vec![("PORT", "expected a number".to_string())],
            ..ConfigError::default()
        };
        assert_eq!(
            only_invalid.to_string(),
            "invalid environment variables: PORT (expected a number)"
        );
    }

    #[test]
    fn test_io_details_use_socket_code() {
        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        let details = DriverErrorDetails::from_sqlx(&err);
        assert_eq!(details.code.as_deref(), Some("ECONNREFUSED"));
        assert!(details.sql_state.is_none());
    }

    #[test]
    fn test_connectivity_error_exposes_code() {
        let err = sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let err = ConnectivityError::from(PoolError::Connect(err));
        assert_eq!(err.code(), Some("ECONNRESET"));
        assert!(err.to_string().contains("ECONNRESET"));
    }

    #[test]
    fn test_pool_error_status_codes() {
        let closed: ApiError = PoolError::Closed.into();
        assert_eq!(closed.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let query: ApiError = PoolError::Query(sqlx::Error::RowNotFound).into();
        assert_eq!(query.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_mysql_error_names() {
        assert_eq!(mysql_error_name(1040), "ER_CON_COUNT_ERROR");
        assert_eq!(mysql_error_name(9999), "ER_9999");
    }
}
