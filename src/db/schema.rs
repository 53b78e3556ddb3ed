// src/db/schema.rs
// DOCUMENTATION: Idempotent schema bootstrap
// PURPOSE: Create the database, its tables in foreign-key order and the seed rows

use crate::db::connection::{Connector, ManagedConnection};
use crate::errors::{BootstrapError, BootstrapStep};

pub const DEFAULT_DATABASE_NAME: &str = "SocialMediaAnalyticsPro";

/// One table of the analytics schema
#[derive(Debug, Clone, Copy)]
pub struct TableDefinition {
    pub name: &'static str,
    /// Tables this one holds foreign keys into
    pub depends_on: &'static [&'static str],
    pub ddl: &'static str,
}

/// Tables in creation order; every table appears after the tables it references
pub const TABLES: [TableDefinition; 5] = [
    TableDefinition {
        name: "users",
        depends_on: &[],
        ddl: r#"CREATE TABLE IF NOT EXISTS users (
            id INT AUTO_INCREMENT PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255) UNIQUE NOT NULL,
            password_hash VARCHAR(255),
            role VARCHAR(50) DEFAULT 'analyst',
            profile_picture TEXT,
            google_id VARCHAR(255) UNIQUE
        )"#,
    },
    TableDefinition {
        name: "platforms",
        depends_on: &[],
        ddl: r#"CREATE TABLE IF NOT EXISTS platforms (
            id INT AUTO_INCREMENT PRIMARY KEY,
            name VARCHAR(50) NOT NULL UNIQUE
        )"#,
    },
    TableDefinition {
        name: "platform_accounts",
        depends_on: &["users", "platforms"],
        ddl: r#"CREATE TABLE IF NOT EXISTS platform_accounts (
            id INT AUTO_INCREMENT PRIMARY KEY,
            user_id INT NOT NULL,
            platform_id INT NOT NULL,
            external_username VARCHAR(255),
            access_token TEXT,
            refresh_token TEXT,
            expires_at DATETIME,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (platform_id) REFERENCES platforms(id)
        )"#,
    },
    TableDefinition {
        name: "posts",
        depends_on: &["platform_accounts"],
        ddl: r#"CREATE TABLE IF NOT EXISTS posts (
            id INT AUTO_INCREMENT PRIMARY KEY,
            platform_account_id INT NOT NULL,
            external_post_id VARCHAR(255),
            content TEXT,
            date_posted DATETIME,
            FOREIGN KEY (platform_account_id) REFERENCES platform_accounts(id)
        )"#,
    },
    TableDefinition {
        name: "engagements",
        depends_on: &["posts"],
        ddl: r#"CREATE TABLE IF NOT EXISTS engagements (
            id INT AUTO_INCREMENT PRIMARY KEY,
            post_id INT NOT NULL,
            views INT DEFAULT 0,
            likes INT DEFAULT 0,
            comments INT DEFAULT 0,
            engagement_score FLOAT DEFAULT 0,
            FOREIGN KEY (post_id) REFERENCES posts(id)
        )"#,
    },
];

/// A lookup row that must exist exactly once
#[derive(Debug, Clone, Copy)]
pub struct SeedRow {
    pub table: &'static str,
    pub name: &'static str,
    /// Duplicate-key-safe insert
    pub sql: &'static str,
}

pub const SEED_ROWS: [SeedRow; 1] = [SeedRow {
    table: "platforms",
    name: "YouTube",
    sql: "INSERT IGNORE INTO platforms (name) VALUES ('YouTube')",
}];

/// Check a database name before it is spliced into DDL
/// DOCUMENTATION: CREATE DATABASE and USE cannot take bound parameters, so the name
/// is restricted to an unquoted MySQL identifier and then backtick-quoted anyway
pub fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.chars().all(|c| c.is_ascii_digit())
}

pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Ordered statements of a full bootstrap run
pub fn plan(database_name: &str) -> Result<Vec<(BootstrapStep, String)>, BootstrapError> {
    if !is_valid_database_name(database_name) {
        return Err(BootstrapError::InvalidDatabaseName(
            database_name.to_string(),
        ));
    }
    let quoted = quote_identifier(database_name);

    let mut steps = vec![
        (
            BootstrapStep::CreateDatabase,
            format!("CREATE DATABASE IF NOT EXISTS {}", quoted),
        ),
        (BootstrapStep::UseDatabase, format!("USE {}", quoted)),
    ];
    steps.extend(
        TABLES
            .iter()
            .map(|table| (BootstrapStep::CreateTable(table.name), table.ddl.to_string())),
    );
    steps.extend(
        SEED_ROWS
            .iter()
            .map(|seed| (BootstrapStep::Seed(seed.table), seed.sql.to_string())),
    );
    Ok(steps)
}

/// Bring the schema up to date over an existing connection
/// DOCUMENTATION: Every statement is create-if-missing or insert-ignore, so running this
/// against a fully bootstrapped database changes nothing. The first failing step aborts
/// the run; earlier steps stay applied.
pub async fn bootstrap<M: ManagedConnection>(
    conn: &mut M,
    database_name: &str,
) -> Result<(), BootstrapError> {
    for (step, sql) in plan(database_name)? {
        log::debug!("Bootstrap step: {}", step);
        conn.execute(&sql)
            .await
            .map_err(|source| BootstrapError::Step { step, source })?;

        match step {
            BootstrapStep::CreateDatabase => {
                log::info!("Database '{}' created or already exists", database_name)
            }
            BootstrapStep::Seed(table) => log::info!("Seed rows for '{}' ensured", table),
            _ => {}
        }
    }
    log::info!("Tables created successfully");
    Ok(())
}

/// Run a bootstrap on a dedicated short-lived connection
/// DOCUMENTATION: The connection is never drawn from the service pool and is closed
/// whether or not the bootstrap succeeds
pub async fn bootstrap_with<C: Connector>(
    connector: &C,
    database_name: &str,
) -> Result<(), BootstrapError> {
    if !is_valid_database_name(database_name) {
        return Err(BootstrapError::InvalidDatabaseName(
            database_name.to_string(),
        ));
    }

    let mut conn = connector.connect().await.map_err(BootstrapError::Connect)?;
    log::info!("Connected to MySQL server");

    let result = bootstrap(&mut conn, database_name).await;

    if let Err(err) = conn.close().await {
        log::warn!("Error closing bootstrap connection: {}", err);
    }

    if let Err(err) = &result {
        match err.driver_details() {
            Some(details) => log::error!("Error setting up database: {} ({})", err, details),
            None => log::error!("Error setting up database: {}", err),
        }
    }
    result
}
