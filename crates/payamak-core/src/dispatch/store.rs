//! Persistence seam for the dispatch loop

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payamak_common::types::CampaignId;
use payamak_common::{Error, Result};
use payamak_storage::db::DatabasePool;
use payamak_storage::models::{Campaign, CampaignStatus, FinalizeSegment, Segment, StatsUpdate};
use payamak_storage::repository::{CampaignRepository, SegmentRepository, StatsRepository};
use uuid::Uuid;

/// Everything the dispatch loop and scheduler need from storage. The
/// Postgres implementation is [`PgDispatchStore`]; tests drive the loop
/// against an in-memory double.
#[async_trait]
pub trait DispatchStore: Send + Sync + 'static {
    /// Fetch a campaign
    async fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>>;

    /// Unconditionally set a campaign's status
    async fn update_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<()>;

    /// Set a campaign's status only when it currently holds `from`
    async fn transition_campaign(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool>;

    /// Next pending segments in batch order
    async fn pending_segments(&self, campaign_id: CampaignId, limit: i64) -> Result<Vec<Segment>>;

    /// Remaining pending segments
    async fn count_pending(&self, campaign_id: CampaignId) -> Result<i64>;

    /// Claim a segment; false means another dispatcher holds it
    async fn mark_in_progress(&self, segment_id: Uuid) -> Result<bool>;

    /// Write a segment's terminal outcome
    async fn finalize_segment(&self, segment_id: Uuid, outcome: FinalizeSegment) -> Result<bool>;

    /// Fold one gateway-call outcome into the campaign's stats
    async fn record_outcome(&self, campaign_id: CampaignId, update: StatsUpdate) -> Result<()>;

    /// Scheduled campaigns due at `now`
    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// In-progress campaigns with pending segments left behind by an
    /// interrupted run
    async fn resumable_campaigns(&self) -> Result<Vec<Campaign>>;

    /// Put a campaign's stuck in_progress segments back to pending
    async fn requeue_in_progress(&self, campaign_id: CampaignId) -> Result<u64>;
}

/// Postgres-backed dispatch store
#[derive(Clone)]
pub struct PgDispatchStore {
    campaign_repo: CampaignRepository,
    segment_repo: SegmentRepository,
    stats_repo: StatsRepository,
}

impl PgDispatchStore {
    /// Create a store over the shared pool
    pub fn new(db_pool: &DatabasePool) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaign_repo: CampaignRepository::new(pool.clone()),
            segment_repo: SegmentRepository::new(pool.clone()),
            stats_repo: StatsRepository::new(pool),
        }
    }
}

fn db_err(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        self.campaign_repo.get(id).await.map_err(db_err)
    }

    async fn update_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<()> {
        self.campaign_repo
            .update_status(id, status)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn transition_campaign(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        self.campaign_repo
            .transition_status(id, from, to)
            .await
            .map_err(db_err)
    }

    async fn pending_segments(&self, campaign_id: CampaignId, limit: i64) -> Result<Vec<Segment>> {
        self.segment_repo
            .list_pending(campaign_id, limit)
            .await
            .map_err(db_err)
    }

    async fn count_pending(&self, campaign_id: CampaignId) -> Result<i64> {
        self.segment_repo
            .count_pending(campaign_id)
            .await
            .map_err(db_err)
    }

    async fn mark_in_progress(&self, segment_id: Uuid) -> Result<bool> {
        self.segment_repo
            .mark_in_progress(segment_id)
            .await
            .map_err(db_err)
    }

    async fn finalize_segment(&self, segment_id: Uuid, outcome: FinalizeSegment) -> Result<bool> {
        self.segment_repo
            .finalize(segment_id, outcome)
            .await
            .map_err(db_err)
    }

    async fn record_outcome(&self, campaign_id: CampaignId, update: StatsUpdate) -> Result<()> {
        self.stats_repo
            .record_outcome(campaign_id, update)
            .await
            .map_err(db_err)
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        self.campaign_repo.scheduled_due(now).await.map_err(db_err)
    }

    async fn resumable_campaigns(&self) -> Result<Vec<Campaign>> {
        self.campaign_repo.resumable().await.map_err(db_err)
    }

    async fn requeue_in_progress(&self, campaign_id: CampaignId) -> Result<u64> {
        self.segment_repo
            .requeue_in_progress(campaign_id)
            .await
            .map_err(db_err)
    }
}
