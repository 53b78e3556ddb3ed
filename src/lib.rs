// src/lib.rs
// DOCUMENTATION: Library root shared by the service and the setup binary
// PURPOSE: Configuration, database lifecycle and HTTP health surface

pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
