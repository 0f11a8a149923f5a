//! Segment repository

use payamak_common::types::CampaignId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateSegment, FinalizeSegment, Segment, SegmentStatus, SegmentSummary};

/// Segment repository
#[derive(Clone)]
pub struct SegmentRepository {
    pool: PgPool,
}

impl SegmentRepository {
    /// Create a new segment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a single segment
    pub async fn create(&self, input: CreateSegment) -> Result<Segment, sqlx::Error> {
        sqlx::query_as::<_, Segment>(
            r#"
            INSERT INTO segments (id, campaign_id, batch_number, numbers, scheduled_for)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.campaign_id)
        .bind(input.batch_number)
        .bind(&input.numbers)
        .bind(input.scheduled_for)
        .fetch_one(&self.pool)
        .await
    }

    /// Insert a batch of segments in one transaction
    pub async fn create_batch(&self, inputs: Vec<CreateSegment>) -> Result<Vec<Segment>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut segments = Vec::with_capacity(inputs.len());

        for input in inputs {
            let segment = sqlx::query_as::<_, Segment>(
                r#"
                INSERT INTO segments (id, campaign_id, batch_number, numbers, scheduled_for)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(input.campaign_id)
            .bind(input.batch_number)
            .bind(&input.numbers)
            .bind(input.scheduled_for)
            .fetch_one(&mut *tx)
            .await?;
            segments.push(segment);
        }

        tx.commit().await?;
        Ok(segments)
    }

    /// Get a segment by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Segment>, sqlx::Error> {
        sqlx::query_as::<_, Segment>("SELECT * FROM segments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Next batch of pending segments for a campaign, in batch order
    pub async fn list_pending(
        &self,
        campaign_id: CampaignId,
        limit: i64,
    ) -> Result<Vec<Segment>, sqlx::Error> {
        sqlx::query_as::<_, Segment>(
            r#"
            SELECT * FROM segments
            WHERE campaign_id = $1 AND status = 'pending'
            ORDER BY batch_number ASC
            LIMIT $2
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Count pending segments for a campaign
    pub async fn count_pending(&self, campaign_id: CampaignId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM segments WHERE campaign_id = $1 AND status = 'pending'",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Count segments for a campaign by status
    pub async fn count_by_status(
        &self,
        campaign_id: CampaignId,
        status: SegmentStatus,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM segments WHERE campaign_id = $1 AND status = $2",
        )
        .bind(campaign_id)
        .bind(status.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Claim a pending segment for dispatch. The status guard makes the
    /// claim idempotent: a second caller gets false.
    pub async fn mark_in_progress(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE segments SET
                status = 'in_progress',
                started_at = NOW(),
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Write a segment's terminal outcome and telemetry. Guarded on
    /// in_progress so a cancelled or re-claimed segment is left alone.
    pub async fn finalize(
        &self,
        id: Uuid,
        outcome: FinalizeSegment,
    ) -> Result<bool, sqlx::Error> {
        let status = outcome
            .status
            .unwrap_or(SegmentStatus::Failed)
            .to_string();

        let result = sqlx::query(
            r#"
            UPDATE segments SET
                status = $2,
                sent_count = $3,
                failed_count = $4,
                last_error = $5,
                error_type = $6,
                message = COALESCE($7, message),
                tag = COALESCE($8, tag),
                http_status_code = $9,
                response_time_ms = $10,
                request_size = $11,
                response_size = $12,
                api_request = $13,
                api_response = $14,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(outcome.sent_count as i32)
        .bind(outcome.failed_count as i32)
        .bind(&outcome.last_error)
        .bind(&outcome.error_type)
        .bind(&outcome.message)
        .bind(&outcome.tag)
        .bind(outcome.http_status_code)
        .bind(outcome.response_time_ms)
        .bind(outcome.request_size)
        .bind(outcome.response_size)
        .bind(&outcome.api_request)
        .bind(&outcome.api_response)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Segments stuck in_progress (interrupted run) put back to pending
    pub async fn requeue_in_progress(&self, campaign_id: CampaignId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE segments SET
                status = 'pending',
                started_at = NULL,
                updated_at = NOW()
            WHERE campaign_id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Trimmed segment list for a campaign (payload columns omitted)
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<SegmentSummary>, sqlx::Error> {
        sqlx::query_as::<_, SegmentSummary>(
            r#"
            SELECT
                id, campaign_id, batch_number, status,
                CARDINALITY(numbers) AS batch_size,
                sent_count, failed_count, http_status_code, response_time_ms,
                error_type, last_error, started_at, completed_at
            FROM segments
            WHERE campaign_id = $1
            ORDER BY batch_number ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Highest batch_number used by a campaign, if any
    pub async fn max_batch_number(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<i32>, sqlx::Error> {
        let row: (Option<i32>,) =
            sqlx::query_as("SELECT MAX(batch_number) FROM segments WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
