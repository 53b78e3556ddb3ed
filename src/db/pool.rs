// src/db/pool.rs
// DOCUMENTATION: Shared MySQL connection pool with fault reporting
// PURPOSE: Lease connections from sqlx's pool and publish transient faults

use crate::db::fault::{FaultEvent, FaultReporter};
use crate::errors::PoolError;
use serde::Serialize;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Connection as _, Pool};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::broadcast;

/// Acquire deadline handed to sqlx when no timeout is configured
/// DOCUMENTATION: sqlx always needs a deadline; a year is long enough to behave as
/// "wait forever" for a long-running service
pub const UNBOUNDED_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Upper bound on the direct connection attempt that explains a timed-out acquire
const DIAGNOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Boxed body of a unit of work run on a leased connection
pub type UnitOfWork<'c, T> = Pin<Box<dyn Future<Output = Result<T, sqlx::Error>> + Send + 'c>>;

/// Pool settings
/// DOCUMENTATION: Built from Config in config::db; defaults mirror the service defaults
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Upper bound on simultaneously live connections
    pub max_connections: u32,
    /// How long an acquire may wait; `None` waits indefinitely
    pub acquire_timeout: Option<Duration>,
    /// Idle connections older than this are closed
    pub idle_timeout: Option<Duration>,
    /// Connections are recycled after this long
    pub max_lifetime: Option<Duration>,
    /// Ping idle connections before handing them out
    pub test_before_acquire: bool,
    /// Buffered fault events per subscriber
    pub fault_channel_capacity: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: None,
            // Connection idle timeout (5 minutes)
            idle_timeout: Some(Duration::from_secs(300)),
            // Connection lifetime (30 minutes before recycle)
            max_lifetime: Some(Duration::from_secs(1800)),
            test_before_acquire: true,
            fault_channel_capacity: 64,
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn test_before_acquire(mut self, test: bool) -> Self {
        self.test_before_acquire = test;
        self
    }

    fn deadline(&self) -> Duration {
        self.acquire_timeout.unwrap_or(UNBOUNDED_ACQUIRE_TIMEOUT)
    }

    fn to_sqlx(&self, faults: FaultReporter) -> MySqlPoolOptions {
        let options = MySqlPoolOptions::new()
            // Maximum concurrent connections
            .max_connections(self.max_connections)
            .acquire_timeout(self.deadline())
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
            // The liveness ping runs in before_acquire instead, where a failure can be reported
            .test_before_acquire(false);

        if !self.test_before_acquire {
            return options;
        }
        options.before_acquire(move |conn, _meta| {
            let faults = faults.clone();
            Box::pin(async move {
                match conn.ping().await {
                    Ok(()) => Ok(true),
                    Err(err) => {
                        log::debug!("Discarding stale idle connection: {}", err);
                        faults.report(&err);
                        Ok(false)
                    }
                }
            })
        })
    }
}

/// Point-in-time pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_connections: u32,
    /// Live connections, leased or idle
    pub size: u32,
    pub leased: u32,
    pub idle: u32,
}

/// The service's MySQL pool
/// DOCUMENTATION: One instance per process, owned by main and shared through
/// `web::Data`; clones share the same sqlx pool and fault channel. Connections are
/// opened lazily up to `max_connections`; callers beyond the bound wait in sqlx's
/// queue, which has no length cap and, unless `acquire_timeout` is set, no deadline.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: Pool<MySql>,
    connect_options: MySqlConnectOptions,
    options: PoolOptions,
    faults: FaultReporter,
}

impl ConnectionPool {
    /// Create the pool without opening any connection
    pub fn open(connect_options: MySqlConnectOptions, options: PoolOptions) -> Self {
        let faults = FaultReporter::new(options.fault_channel_capacity);

        log::info!(
            "Initializing database pool (max {} connections, acquire timeout: {})",
            options.max_connections,
            options
                .acquire_timeout
                .map_or_else(|| "none".to_string(), |t| format!("{:?}", t))
        );

        let pool = options
            .to_sqlx(faults.clone())
            .connect_lazy_with(connect_options.clone());

        Self {
            pool,
            connect_options,
            options,
            faults,
        }
    }

    /// Lease a connection, waiting for capacity if the pool is saturated
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let result = self.pool.acquire().await;
        self.lease(result, self.options.deadline()).await
    }

    /// Lease a connection, giving up after `limit` whatever the pool's own timeout
    pub async fn acquire_within(&self, limit: Duration) -> Result<PooledConnection, PoolError> {
        let result = tokio::time::timeout(limit, self.pool.acquire())
            .await
            .unwrap_or(Err(sqlx::Error::PoolTimedOut));
        self.lease(result, limit).await
    }

    async fn lease(
        &self,
        result: Result<PoolConnection<MySql>, sqlx::Error>,
        waited: Duration,
    ) -> Result<PooledConnection, PoolError> {
        match result {
            Ok(conn) => Ok(PooledConnection {
                conn: Some(conn),
                faults: self.faults.clone(),
                discard: false,
            }),
            Err(sqlx::Error::PoolClosed) => Err(PoolError::Closed),
            Err(sqlx::Error::PoolTimedOut) => Err(self.diagnose(waited).await),
            Err(err) => {
                self.faults.report(&err);
                Err(PoolError::Connect(err))
            }
        }
    }

    /// Explain a timed-out acquire
    /// DOCUMENTATION: sqlx retries refused connects until the deadline and then only
    /// reports PoolTimedOut. When the pool had spare capacity, one direct connection
    /// attempt recovers the driver error; a saturated pool or a server that answers
    /// means the wait itself was the problem.
    async fn diagnose(&self, waited: Duration) -> PoolError {
        let saturated =
            self.pool.size() >= self.options.max_connections && self.pool.num_idle() == 0;
        if saturated {
            return PoolError::Timeout(waited);
        }

        let attempt = MySqlConnection::connect_with(&self.connect_options);
        match tokio::time::timeout(waited.min(DIAGNOSE_TIMEOUT), attempt).await {
            Ok(Ok(conn)) => {
                if let Err(err) = conn.close().await {
                    log::debug!("Error closing diagnostic connection: {}", err);
                }
                PoolError::Timeout(waited)
            }
            Ok(Err(err)) => {
                self.faults.report(&err);
                PoolError::Connect(err)
            }
            Err(_) => PoolError::Timeout(waited),
        }
    }

    /// Subscribe to classified transient faults
    pub fn subscribe_faults(&self) -> broadcast::Receiver<FaultEvent> {
        self.faults.subscribe()
    }

    pub fn status(&self) -> PoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        PoolStatus {
            max_connections: self.options.max_connections,
            size,
            leased: size.saturating_sub(idle),
            idle,
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Shut the pool down
    /// DOCUMENTATION: New and waiting acquires fail with PoolError::Closed; sqlx waits for
    /// leased connections to come back and closes every connection gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        log::info!("Database pool closed");
    }
}

/// A leased connection
/// DOCUMENTATION: Exclusively owned by one unit of work and returned to the pool when
/// dropped, on every exit path including `?` and panics. The raw connection is only
/// reachable through `run`, so every driver error is classified and published.
pub struct PooledConnection {
    conn: Option<PoolConnection<MySql>>,
    faults: FaultReporter,
    discard: bool,
}

impl PooledConnection {
    /// Run a unit of work on the raw connection
    /// DOCUMENTATION: A failure is published on the fault channel; a lost or refused
    /// connection is detached from the pool on release instead of being reused
    pub async fn run<'c, T, F>(&'c mut self, unit: F) -> Result<T, PoolError>
    where
        F: FnOnce(&'c mut MySqlConnection) -> UnitOfWork<'c, T>,
    {
        let Some(conn) = self.conn.as_mut() else {
            return Err(PoolError::Closed);
        };

        match unit(&mut **conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Some(fault) = self.faults.report(&err) {
                    self.discard |= fault.discards_connection();
                }
                Err(PoolError::Query(err))
            }
        }
    }

    /// Execute one statement over the text protocol, returning rows affected
    pub async fn execute(&mut self, sql: &str) -> Result<u64, PoolError> {
        self.run(move |conn| {
            Box::pin(async move {
                sqlx::Executor::execute(conn, sql)
                    .await
                    .map(|done| done.rows_affected())
            })
        })
        .await
    }

    /// Return the connection to the pool now
    pub fn release(self) {}
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if !self.discard {
            return;
        }
        if let Some(conn) = self.conn.take() {
            // Detached connections no longer count against the pool size
            drop(conn.detach());
        }
    }
}
