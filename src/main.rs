// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Load the environment, set up logging, then start the service

use dotenv::dotenv;
use social_analytics::app;
use social_analytics::config::env::DEFAULT_LOG_LEVEL;
use std::io;

fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
        std::env::set_var("RUST_LOG", level);
    }
    env_logger::init();
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Initialize logging first so that configuration errors are logged too
    init_logging();

    // 3. Validate configuration, open the pool and probe it once
    let service = match app::startup().await {
        Ok(service) => service,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    // 4. Start HTTP server
    app::serve(service).await
}
