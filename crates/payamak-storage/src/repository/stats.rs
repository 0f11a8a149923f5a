//! Campaign statistics repository

use payamak_common::types::CampaignId;
use sqlx::PgPool;

use crate::models::{CampaignStats, StatsUpdate};

/// Campaign statistics repository
#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    /// Create a new stats repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a zeroed stats row for a campaign
    pub async fn create(&self, campaign_id: CampaignId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO campaign_stats (campaign_id) VALUES ($1) ON CONFLICT DO NOTHING",
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get stats for a campaign
    pub async fn get(&self, campaign_id: CampaignId) -> Result<Option<CampaignStats>, sqlx::Error> {
        sqlx::query_as::<_, CampaignStats>(
            "SELECT * FROM campaign_stats WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Fold one gateway-call outcome into the aggregate row. A single UPDATE
    /// so concurrent segments never lose counts. request_count always moves;
    /// the response-time aggregates only move when a response time was
    /// observed.
    pub async fn record_outcome(
        &self,
        campaign_id: CampaignId,
        update: StatsUpdate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaign_stats SET
                total_sent = total_sent + $2,
                total_success = total_success + $3,
                total_failed = total_failed + $4,
                total_partial_success = total_partial_success + $5,
                request_count = request_count + 1,
                total_response_time = total_response_time + COALESCE($6, 0),
                average_response_time = CASE
                    WHEN $6 IS NULL THEN average_response_time
                    ELSE (total_response_time + $6)::float8 / (request_count + 1)
                END,
                min_response_time = CASE
                    WHEN $6 IS NULL THEN min_response_time
                    ELSE LEAST(COALESCE(min_response_time, $6), $6)
                END,
                max_response_time = CASE
                    WHEN $6 IS NULL THEN max_response_time
                    ELSE GREATEST(COALESCE(max_response_time, $6), $6)
                END,
                last_error = COALESCE($7, last_error),
                last_success_at = CASE WHEN $8 THEN NOW() ELSE last_success_at END,
                last_failure_at = CASE WHEN $8 THEN last_failure_at ELSE NOW() END,
                last_updated = NOW()
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(update.sent)
        .bind(update.success)
        .bind(update.failed)
        .bind(update.partial_success)
        .bind(update.response_time_ms)
        .bind(&update.error_message)
        .bind(update.is_success)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
