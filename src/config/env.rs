// src/config/env.rs
// DOCUMENTATION: Environment variable management
// PURPOSE: Load and validate configuration from the environment

use crate::db::schema::{is_valid_database_name, DEFAULT_DATABASE_NAME};
use crate::errors::ConfigError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Keys that must be set and non-empty before the service may start
/// DOCUMENTATION: The external API credentials are only consumed by route handlers,
/// but a service without them is half-configured, so they gate startup too
pub const REQUIRED_KEYS: [&str; 6] = [
    "DB_HOST",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "GOOGLE_CLIENT_ID",
    "YOUTUBE_API_KEY",
];

pub const DEFAULT_LOG_LEVEL: &str = "info,actix_web=info,sqlx=warn";

/// Application configuration loaded from environment variables
/// DOCUMENTATION: Centralizes all configuration in one struct
/// Load with Config::load() at service startup
#[derive(Clone)]
pub struct Config {
    /// MySQL host (DB_HOST, default "localhost")
    pub db_host: String,

    /// MySQL user (DB_USER, default "root")
    pub db_user: String,

    /// MySQL password (DB_PASSWORD, default "root")
    pub db_password: String,

    /// Target database (DB_NAME, default "SocialMediaAnalyticsPro")
    pub db_name: String,

    /// MySQL port (DB_PORT, default 3306)
    pub db_port: u16,

    /// Maximum connections in database pool (DB_CONNECTION_LIMIT, default 10)
    pub db_connection_limit: u32,

    /// Seconds to wait for a pooled connection (DB_ACQUIRE_TIMEOUT); unset waits forever
    pub db_acquire_timeout: Option<u64>,

    /// Server bind address (SERVER_ADDRESS, default "0.0.0.0")
    pub server_address: String,

    /// Server listen port (PORT, default 5000)
    pub server_port: u16,

    /// Environment: development, staging, production
    pub environment: String,

    /// Log filter used when RUST_LOG is not set
    pub log_level: String,

    /// OAuth client id used by the login routes
    pub google_client_id: String,

    /// YouTube Data API key used by the analytics routes
    pub youtube_api_key: String,
}

type Invalid = Vec<(&'static str, String)>;

impl Config {
    /// Load configuration with defaults and no validation
    /// DOCUMENTATION: Used by the setup binary, which runs happily on defaults
    pub fn from_env() -> Self {
        let (config, invalid) = Self::read(|key| env::var(key).ok());
        for (key, reason) in invalid {
            log::warn!("Ignoring {}: {}", key, reason);
        }
        config
    }

    /// Load and validate configuration from the process environment
    /// DOCUMENTATION: `.env` is loaded once by the binary before this is called
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(|key| env::var(key).ok())
    }

    /// Resolve configuration through `lookup`
    /// DOCUMENTATION: Fails with every missing required key and every unusable value
    pub fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| non_empty(&lookup, key).is_none())
            .collect();

        let (config, invalid) = Self::read(&lookup);

        let error = ConfigError { missing, invalid };
        if error.is_empty() {
            Ok(config)
        } else {
            Err(error)
        }
    }

    fn read<F>(lookup: F) -> (Self, Invalid)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(&lookup, key);
        let mut invalid = Invalid::new();

        let db_name = get("DB_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string());
        if !is_valid_database_name(&db_name) {
            invalid.push((
                "DB_NAME",
                "must be 1-64 characters of letters, digits, '_' or '$'".to_string(),
            ));
        }

        let db_connection_limit =
            parse_or(get("DB_CONNECTION_LIMIT"), "DB_CONNECTION_LIMIT", 10, &mut invalid);
        if db_connection_limit == 0 {
            invalid.push(("DB_CONNECTION_LIMIT", "must be at least 1".to_string()));
        }

        let db_acquire_timeout = get("DB_ACQUIRE_TIMEOUT")
            .map(|raw| parse_or(Some(raw), "DB_ACQUIRE_TIMEOUT", 30, &mut invalid));

        let config = Config {
            db_host: get("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            db_user: get("DB_USER").unwrap_or_else(|| "root".to_string()),
            db_password: get("DB_PASSWORD").unwrap_or_else(|| "root".to_string()),
            db_name,
            db_port: parse_or(get("DB_PORT"), "DB_PORT", 3306, &mut invalid),
            db_connection_limit,
            db_acquire_timeout,
            server_address: get("SERVER_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(get("PORT"), "PORT", 5000, &mut invalid),
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            google_client_id: get("GOOGLE_CLIENT_ID").unwrap_or_default(),
            youtube_api_key: get("YOUTUBE_API_KEY").unwrap_or_default(),
        };
        (config, invalid)
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.db_acquire_timeout.map(Duration::from_secs)
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T, invalid: &mut Invalid) -> T {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            invalid.push((key, format!("expected a non-negative integer, got {:?}", raw)));
            default
        }),
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "***"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_host", &self.db_host)
            .field("db_user", &self.db_user)
            .field("db_password", &redact(&self.db_password))
            .field("db_name", &self.db_name)
            .field("db_port", &self.db_port)
            .field("db_connection_limit", &self.db_connection_limit)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("server_address", &self.server_address)
            .field("server_port", &self.server_port)
            .field("environment", &self.environment)
            .field("log_level", &self.log_level)
            .field("google_client_id", &redact(&self.google_client_id))
            .field("youtube_api_key", &redact(&self.youtube_api_key))
            .finish()
    }
}
