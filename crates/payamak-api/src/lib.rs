//! Payamak API - REST API server
//!
//! This crate provides the REST API for campaign creation, dispatch
//! control, and telemetry inspection.

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::AppState;
pub use routes::create_router;
