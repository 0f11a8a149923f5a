//! Campaign Service - campaign lifecycle and segment management

use chrono::{DateTime, Utc};
use payamak_common::types::{CampaignId, UserId};
use payamak_storage::db::DatabasePool;
use payamak_storage::models::{
    Campaign, CampaignStats, CampaignStatus, CampaignWithStats, CreateCampaign, CreateSegment,
    Segment, SegmentSummary,
};
use payamak_storage::repository::{CampaignRepository, SegmentRepository, StatsRepository};
use thiserror::Error;
use tracing::info;

use crate::lifecycle;
use crate::segmenter;

/// Campaign service errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Recipient list is empty after sanitization")]
    EmptyRecipientList,

    #[error("Scheduled time is in the past")]
    ScheduledInPast,

    #[error("Segments can only be added before dispatch starts")]
    NotAcceptingSegments,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// New campaign input
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub tag: String,
    pub message: String,
    pub numbers: Vec<String>,
    pub created_by: UserId,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Validated campaign input, ready to persist
#[derive(Debug)]
struct PreparedCampaign {
    total_numbers: usize,
    batches: Vec<Vec<String>>,
    status: CampaignStatus,
}

/// Validate and partition a new campaign. A zero-recipient campaign is
/// legal (zero segments); a fire time in the past is not.
fn prepare_campaign(
    input: &NewCampaign,
    now: DateTime<Utc>,
) -> Result<PreparedCampaign, CampaignError> {
    if let Some(scheduled_for) = input.scheduled_for {
        if scheduled_for <= now {
            return Err(CampaignError::ScheduledInPast);
        }
    }

    let numbers = segmenter::sanitize_list(&input.numbers);
    let batches = segmenter::partition(&numbers);
    let status = if input.scheduled_for.is_some() {
        CampaignStatus::Scheduled
    } else {
        CampaignStatus::Pending
    };

    Ok(PreparedCampaign {
        total_numbers: numbers.len(),
        batches,
        status,
    })
}

/// Campaign Service - creation, segment upload, and lifecycle control
#[derive(Clone)]
pub struct CampaignService {
    campaign_repo: CampaignRepository,
    segment_repo: SegmentRepository,
    stats_repo: StatsRepository,
}

impl CampaignService {
    /// Create a new campaign service
    pub fn new(db_pool: &DatabasePool) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaign_repo: CampaignRepository::new(pool.clone()),
            segment_repo: SegmentRepository::new(pool.clone()),
            stats_repo: StatsRepository::new(pool),
        }
    }

    /// Create a campaign: sanitize the recipient list, partition it into
    /// segments, and persist everything. The campaign lands in pending, or
    /// scheduled when a fire time is given. An empty recipient list is
    /// allowed: the campaign starts with zero segments and numbers arrive
    /// through `add_segments`.
    pub async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign, CampaignError> {
        let prepared = prepare_campaign(&input, Utc::now())?;

        let campaign = self
            .campaign_repo
            .create(CreateCampaign {
                tag: input.tag,
                message: input.message,
                total_numbers: prepared.total_numbers as i32,
                total_batches: prepared.batches.len() as i32,
                status: prepared.status,
                created_by: input.created_by,
                scheduled_for: input.scheduled_for,
            })
            .await?;

        let segments: Vec<_> = prepared
            .batches
            .into_iter()
            .enumerate()
            .map(|(i, batch)| CreateSegment {
                campaign_id: campaign.id,
                batch_number: i as i32 + 1,
                numbers: batch,
                scheduled_for: input.scheduled_for,
            })
            .collect();
        self.segment_repo.create_batch(segments).await?;

        info!(
            campaign_id = %campaign.id,
            total_numbers = campaign.total_numbers,
            total_batches = campaign.total_batches,
            "Campaign created"
        );

        Ok(campaign)
    }

    /// Append more recipients to a campaign that has not started sending.
    /// Batch numbering continues where the existing segments left off.
    pub async fn add_segments(
        &self,
        campaign_id: CampaignId,
        raw_numbers: Vec<String>,
    ) -> Result<Vec<Segment>, CampaignError> {
        let campaign = self
            .campaign_repo
            .get(campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        match campaign.status_enum() {
            Some(CampaignStatus::Pending) | Some(CampaignStatus::Scheduled) => {}
            _ => return Err(CampaignError::NotAcceptingSegments),
        }

        let numbers = segmenter::sanitize_list(&raw_numbers);
        if numbers.is_empty() {
            return Err(CampaignError::EmptyRecipientList);
        }

        let next_batch = self
            .segment_repo
            .max_batch_number(campaign_id)
            .await?
            .unwrap_or(0)
            + 1;

        let batches = segmenter::partition(&numbers);
        let batch_count = batches.len() as i32;
        let inputs: Vec<_> = batches
            .into_iter()
            .enumerate()
            .map(|(i, batch)| CreateSegment {
                campaign_id,
                batch_number: next_batch + i as i32,
                numbers: batch,
                scheduled_for: campaign.scheduled_for,
            })
            .collect();

        let segments = self.segment_repo.create_batch(inputs).await?;
        self.campaign_repo
            .add_totals(campaign_id, numbers.len() as i32, batch_count)
            .await?;

        Ok(segments)
    }

    /// Get a campaign
    pub async fn get(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.campaign_repo
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)
    }

    /// List campaigns
    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, CampaignError> {
        Ok(self.campaign_repo.list(status, limit, offset).await?)
    }

    /// List campaigns with their headline stats
    pub async fn list_with_stats(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CampaignWithStats>, CampaignError> {
        Ok(self
            .campaign_repo
            .list_with_stats(status, limit, offset)
            .await?)
    }

    /// Upcoming scheduled campaigns in fire order
    pub async fn scheduled(&self) -> Result<Vec<Campaign>, CampaignError> {
        Ok(self.campaign_repo.list_scheduled().await?)
    }

    /// Get campaign statistics
    pub async fn stats(&self, id: CampaignId) -> Result<CampaignStats, CampaignError> {
        self.stats_repo.get(id).await?.ok_or(CampaignError::NotFound)
    }

    /// List a campaign's segments (trimmed projection)
    pub async fn segments(&self, id: CampaignId) -> Result<Vec<SegmentSummary>, CampaignError> {
        self.campaign_repo
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)?;
        Ok(self.segment_repo.list_by_campaign(id).await?)
    }

    /// Get one segment with its full telemetry
    pub async fn segment_detail(&self, id: uuid::Uuid) -> Result<Segment, CampaignError> {
        self.segment_repo
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)
    }

    /// Cancel a campaign from any non-terminal state. The dispatch loop
    /// observes the new status at its next wave boundary.
    pub async fn cancel(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.apply_transition(id, CampaignStatus::Cancelled).await
    }

    /// Pause an in-progress campaign
    pub async fn pause(&self, id: CampaignId) -> Result<Campaign, CampaignError> {
        self.apply_transition(id, CampaignStatus::Paused).await
    }

    async fn apply_transition(
        &self,
        id: CampaignId,
        to: CampaignStatus,
    ) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaign_repo
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let from = campaign
            .status_enum()
            .ok_or_else(|| CampaignError::InvalidTransition(campaign.status.clone()))?;

        if !lifecycle::can_transition(from, to) {
            return Err(CampaignError::InvalidTransition(format!(
                "Cannot move campaign from {} to {}",
                from, to
            )));
        }

        info!(campaign_id = %id, from = %from, to = %to, "Campaign transition");

        let updated = self
            .campaign_repo
            .transition_status(id, from, to)
            .await?;
        if !updated {
            // Lost the race against another writer
            return Err(CampaignError::InvalidTransition(format!(
                "Campaign {} changed state concurrently",
                id
            )));
        }

        self.campaign_repo
            .get(id)
            .await?
            .ok_or(CampaignError::NotFound)
    }
}
