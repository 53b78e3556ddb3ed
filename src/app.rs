// src/app.rs
// DOCUMENTATION: Service startup sequence and HTTP server
// PURPOSE: Gate startup on configuration, probe the database, then serve

use crate::config::{init_db_pool, Config};
use crate::db::{spawn_fault_listener, ConnectionPool};
use crate::errors::StartupError;
use crate::handlers;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::io;

/// Everything the HTTP server needs, built in startup order
pub struct Service {
    pub config: Config,
    pub pool: ConnectionPool,
}

/// Resolve configuration from the process environment and open the pool
pub async fn startup() -> Result<Service, StartupError> {
    launch(Config::load()?).await
}

/// Same as `startup`, reading configuration through `lookup`
/// DOCUMENTATION: A configuration error returns before any network resource is opened
pub async fn startup_with<F>(lookup: F) -> Result<Service, StartupError>
where
    F: Fn(&str) -> Option<String>,
{
    launch(Config::resolve(lookup)?).await
}

async fn launch(config: Config) -> Result<Service, StartupError> {
    log::info!("Starting social-analytics service...");
    log::info!("Environment: {}", config.environment);
    log::debug!("Configuration: {:?}", config);

    // Unreachable database is fatal
    let pool = init_db_pool(&config).await?;
    Ok(Service { config, pool })
}

/// Serve HTTP until shutdown, then close the pool exactly once
pub async fn serve(service: Service) -> io::Result<()> {
    let Service { config, pool } = service;

    // Standing listener for asynchronous pool faults
    let fault_listener = spawn_fault_listener(pool.subscribe_faults());

    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    log::info!("Server running on {}", server_addr);

    let app_pool = pool.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_pool.clone()))
            .wrap(Logger::default())
            .configure(handlers::health_config)
    })
    .bind(&server_addr)?
    .run()
    .await;

    pool.close().await;
    fault_listener.abort();

    result
}
