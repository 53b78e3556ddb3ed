// src/config/db.rs
// DOCUMENTATION: Database connection pool initialization
// PURPOSE: Setup and manage the MySQL connection pool

use crate::config::Config;
use crate::db::health;
use crate::db::{ConnectionPool, MySqlConnector, PoolOptions};
use crate::errors::ConnectivityError;
use sqlx::mysql::MySqlConnectOptions;

/// Connect options for the MySQL server, without a default database
pub fn connect_options(config: &Config) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
}

/// Connector for the schema bootstrapper, which creates the database itself
pub fn server_connector(config: &Config) -> MySqlConnector {
    MySqlConnector::new(connect_options(config))
}

pub fn pool_options(config: &Config) -> PoolOptions {
    PoolOptions::new()
        .max_connections(config.db_connection_limit)
        .acquire_timeout(config.acquire_timeout())
}

/// Initialize MySQL connection pool
/// DOCUMENTATION: Opens the pool lazily, then runs the one-time connectivity probe
/// Called once during application startup; an error must abort startup
pub async fn init_db_pool(config: &Config) -> Result<ConnectionPool, ConnectivityError> {
    log::info!(
        "Initializing database pool: {}@{}:{}/{}",
        config.db_user,
        config.db_host,
        config.db_port,
        config.db_name
    );

    let pool = ConnectionPool::open(
        connect_options(config).database(&config.db_name),
        pool_options(config),
    );

    // Verify connection works
    health::probe(&pool).await?;

    log::info!("Database pool initialized successfully");
    Ok(pool)
}
