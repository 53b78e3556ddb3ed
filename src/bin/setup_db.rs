// src/bin/setup_db.rs
// DOCUMENTATION: One-shot schema bootstrap
// PURPOSE: Create the database, tables and seed rows; safe to re-run at any time

use anyhow::Context;
use dotenv::dotenv;
use social_analytics::config::{self, Config};
use social_analytics::db::schema;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = Config::from_env();
    log::info!(
        "Setting up database '{}' on {}@{}:{}",
        config.db_name,
        config.db_user,
        config.db_host,
        config.db_port
    );

    // Own connection, never drawn from the service pool
    let connector = config::db::server_connector(&config);
    schema::bootstrap_with(&connector, &config.db_name)
        .await
        .with_context(|| format!("database setup failed for '{}'", config.db_name))?;

    log::info!("Database setup completed successfully!");
    Ok(())
}
