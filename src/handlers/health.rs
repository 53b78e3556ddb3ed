// src/handlers/health.rs
// DOCUMENTATION: Health check handlers
// PURPOSE: Liveness of the service and of its database connection

use crate::db::{health, ConnectionPool};
use crate::errors::ApiError;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "social-analytics",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn server_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Server is running!" }))
}

/// GET /api/test/db
/// DOCUMENTATION: Runs the health query through the shared pool and reports latency
pub async fn database_check(pool: web::Data<ConnectionPool>) -> Result<HttpResponse, ApiError> {
    let latency = health::check(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "database": "connected",
        "latency_ms": latency.as_secs_f64() * 1000.0,
        "pool": pool.status(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/api/test", web::get().to(server_check))
        .route("/api/test/db", web::get().to(database_check));
}
