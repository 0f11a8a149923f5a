//! Payamak Core - campaign dispatch engine
//!
//! This crate provides recipient segmentation, the SMS gateway client,
//! the wave-based dispatch loop, the scheduler worker, and the campaign
//! lifecycle service.

pub mod campaigns;
pub mod dispatch;
pub mod gateway;
pub mod lifecycle;
pub mod scheduler;
pub mod segmenter;

pub use campaigns::{CampaignError, CampaignService};
pub use dispatch::{DispatchRunner, DispatchService, DispatchStore, PgDispatchStore, RunOutcome};
pub use gateway::{BatchResponse, OkitClient, SmsGateway};
pub use scheduler::SchedulerWorker;
pub use segmenter::{partition, SEGMENT_SIZE};
