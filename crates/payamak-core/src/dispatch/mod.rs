//! Wave-based campaign dispatch

pub mod runner;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod support;

pub use runner::{DispatchRunner, RunOutcome};
pub use service::DispatchService;
pub use store::{DispatchStore, PgDispatchStore};
