//! Repository modules

pub mod campaigns;
pub mod segments;
pub mod stats;

pub use campaigns::CampaignRepository;
pub use segments::SegmentRepository;
pub use stats::StatsRepository;
