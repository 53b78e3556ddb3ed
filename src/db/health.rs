// src/db/health.rs
// DOCUMENTATION: Read-only liveness query against the pool
// PURPOSE: Startup connectivity probe and on-demand database health

use crate::db::pool::{ConnectionPool, PooledConnection};
use crate::errors::{ConnectivityError, PoolError};
use std::time::{Duration, Instant};

pub const HEALTH_QUERY: &str = "SELECT 1";

/// How long the startup probe waits when no acquire timeout is configured
pub const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the health query on a leased connection and return its latency
pub async fn check(pool: &ConnectionPool) -> Result<Duration, PoolError> {
    let started = Instant::now();
    let conn = pool.acquire().await?;
    run_query(conn, started).await
}

/// One-time startup probe
/// DOCUMENTATION: Failure is fatal for the caller; the error carries the driver code.
/// The wait is bounded even when the pool itself waits forever.
pub async fn probe(pool: &ConnectionPool) -> Result<Duration, ConnectivityError> {
    let limit = pool
        .options()
        .acquire_timeout
        .unwrap_or(STARTUP_PROBE_TIMEOUT);
    let started = Instant::now();

    let outcome = match pool.acquire_within(limit).await {
        Ok(conn) => run_query(conn, started).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(latency) => {
            log::info!(
                "Database connected successfully ({:.1} ms)",
                latency.as_secs_f64() * 1000.0
            );
            Ok(latency)
        }
        Err(err) => {
            let err = ConnectivityError::from(err);
            log::error!("Database connection error: {}", err.details);
            Err(err)
        }
    }
}

async fn run_query(mut conn: PooledConnection, started: Instant) -> Result<Duration, PoolError> {
    conn.execute(HEALTH_QUERY).await?;
    conn.release();
    Ok(started.elapsed())
}
