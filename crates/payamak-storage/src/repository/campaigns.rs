//! Campaign repository

use chrono::{DateTime, Utc};
use payamak_common::types::CampaignId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus, CampaignWithStats, CreateCampaign};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new campaign together with its zeroed stats row
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, tag, message, total_numbers, total_batches, status,
                created_by, is_scheduled, scheduled_for
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.tag)
        .bind(&input.message)
        .bind(input.total_numbers)
        .bind(input.total_batches)
        .bind(input.status.to_string())
        .bind(input.created_by)
        .bind(input.scheduled_for.is_some())
        .bind(input.scheduled_for)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO campaign_stats (campaign_id) VALUES ($1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(campaign)
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns, newest first
    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// List campaigns joined with their headline stats, newest first
    pub async fn list_with_stats(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CampaignWithStats>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, CampaignWithStats>(
                r#"
                SELECT
                    c.id, c.tag, c.message, c.total_numbers, c.total_batches,
                    c.status, c.is_scheduled, c.scheduled_for,
                    c.created_at, c.updated_at, c.completed_at,
                    s.total_sent, s.total_success, s.total_failed,
                    s.request_count, s.average_response_time
                FROM campaigns c
                JOIN campaign_stats s ON s.campaign_id = c.id
                WHERE c.status = $1
                ORDER BY c.created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, CampaignWithStats>(
                r#"
                SELECT
                    c.id, c.tag, c.message, c.total_numbers, c.total_batches,
                    c.status, c.is_scheduled, c.scheduled_for,
                    c.created_at, c.updated_at, c.completed_at,
                    s.total_sent, s.total_success, s.total_failed,
                    s.request_count, s.average_response_time
                FROM campaigns c
                JOIN campaign_stats s ON s.campaign_id = c.id
                ORDER BY c.created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Upcoming scheduled campaigns in fire order
    pub async fn list_scheduled(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status = 'scheduled'
            ORDER BY scheduled_for ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Update campaign status, stamping completed_at on terminal states
    pub async fn update_status(
        &self,
        id: CampaignId,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let completed_at = if status.is_terminal() {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                completed_at = COALESCE($3, completed_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Guarded status change: only applies when the campaign is currently in
    /// `from`. Returns false when another writer got there first.
    pub async fn transition_status(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, sqlx::Error> {
        let completed_at = if to.is_terminal() { Some(Utc::now()) } else { None };

        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = $3,
                completed_at = COALESCE($4, completed_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Add to the campaign's number and batch totals (segments appended
    /// after creation)
    pub async fn add_totals(
        &self,
        id: CampaignId,
        numbers: i32,
        batches: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                total_numbers = total_numbers + $2,
                total_batches = total_batches + $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(numbers)
        .bind(batches)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Scheduled campaigns whose fire time has passed
    pub async fn scheduled_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status = 'scheduled'
              AND scheduled_for IS NOT NULL
              AND scheduled_for <= $1
            ORDER BY scheduled_for ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    /// In-progress campaigns that still have pending segments. Picked up on
    /// restart so an interrupted run resumes where it stopped.
    pub async fn resumable(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT c.* FROM campaigns c
            WHERE c.status = 'in_progress'
              AND EXISTS (
                  SELECT 1 FROM segments s
                  WHERE s.campaign_id = c.id AND s.status = 'pending'
              )
            ORDER BY c.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Count campaigns, optionally by status
    pub async fn count(&self, status: Option<CampaignStatus>) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE status = $1")
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns")
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }
}
