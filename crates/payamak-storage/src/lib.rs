//! Payamak Storage - PostgreSQL persistence layer
//!
//! This crate provides the database pool, row models, and repositories
//! for campaigns, segments, and campaign statistics.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
