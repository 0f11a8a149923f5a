//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use payamak_core::campaigns::NewCampaign;
use payamak_storage::models::{Campaign, CampaignStats, CampaignStatus, CampaignWithStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::AppState;
use crate::handlers::{campaign_error, ErrorResponse};

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Campaign list response
#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignListItem>,
    pub limit: i64,
    pub offset: i64,
}

/// Campaign list entry with headline stats
#[derive(Debug, Serialize)]
pub struct CampaignListItem {
    pub id: Uuid,
    pub tag: String,
    pub message: String,
    pub status: String,
    pub total_numbers: i32,
    pub total_batches: i32,
    pub is_scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_sent: i64,
    pub total_success: i64,
    pub total_failed: i64,
    pub request_count: i64,
    pub average_response_time: Option<f64>,
}

impl From<CampaignWithStats> for CampaignListItem {
    fn from(c: CampaignWithStats) -> Self {
        Self {
            id: c.id,
            tag: c.tag,
            message: c.message,
            status: c.status,
            total_numbers: c.total_numbers,
            total_batches: c.total_batches,
            is_scheduled: c.is_scheduled,
            scheduled_for: c.scheduled_for,
            created_at: c.created_at,
            completed_at: c.completed_at,
            total_sent: c.total_sent,
            total_success: c.total_success,
            total_failed: c.total_failed,
            request_count: c.request_count,
            average_response_time: c.average_response_time,
        }
    }
}

/// Campaign response
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub tag: String,
    pub message: String,
    pub status: String,
    pub total_numbers: i32,
    pub total_batches: i32,
    pub is_scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            tag: c.tag,
            message: c.message,
            status: c.status,
            total_numbers: c.total_numbers,
            total_batches: c.total_batches,
            is_scheduled: c.is_scheduled,
            scheduled_for: c.scheduled_for,
            created_at: c.created_at,
            updated_at: c.updated_at,
            completed_at: c.completed_at,
        }
    }
}

/// Campaign statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub campaign_id: Uuid,
    pub total_sent: i64,
    pub total_success: i64,
    pub total_failed: i64,
    pub total_partial_success: i64,
    pub request_count: i64,
    pub average_response_time: Option<f64>,
    pub min_response_time: Option<i64>,
    pub max_response_time: Option<i64>,
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl From<CampaignStats> for StatsResponse {
    fn from(s: CampaignStats) -> Self {
        Self {
            campaign_id: s.campaign_id,
            total_sent: s.total_sent,
            total_success: s.total_success,
            total_failed: s.total_failed,
            total_partial_success: s.total_partial_success,
            request_count: s.request_count,
            average_response_time: s.average_response_time,
            min_response_time: s.min_response_time,
            max_response_time: s.max_response_time,
            last_error: s.last_error,
            last_updated: s.last_updated,
            last_success_at: s.last_success_at,
            last_failure_at: s.last_failure_at,
        }
    }
}

/// Request body for creating a campaign
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub tag: String,
    pub message: String,
    pub numbers: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    /// Start sending immediately after creation (ignored for scheduled
    /// campaigns)
    #[serde(default = "default_dispatch_now")]
    pub dispatch_now: bool,
}

fn default_dispatch_now() -> bool {
    true
}

/// List campaigns
///
/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = query.status.and_then(|s| s.parse::<CampaignStatus>().ok());

    let campaigns = state
        .campaigns
        .list_with_stats(status, query.limit, query.offset)
        .await
        .map_err(campaign_error)?;

    Ok(Json(CampaignListResponse {
        data: campaigns.into_iter().map(CampaignListItem::from).collect(),
        limit: query.limit,
        offset: query.offset,
    }))
}

/// List upcoming scheduled campaigns in fire order
///
/// GET /api/v1/campaigns/scheduled
pub async fn list_scheduled(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CampaignResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let campaigns = state.campaigns.scheduled().await.map_err(campaign_error)?;
    Ok(Json(
        campaigns.into_iter().map(CampaignResponse::from).collect(),
    ))
}

/// Create a new campaign
///
/// POST /api/v1/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), (StatusCode, Json<ErrorResponse>)> {
    if input.tag.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "validation_error".to_string(),
                message: "Campaign tag is required".to_string(),
            }),
        ));
    }

    if input.message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "validation_error".to_string(),
                message: "Message is required".to_string(),
            }),
        ));
    }

    let dispatch_now = input.dispatch_now && input.scheduled_for.is_none();

    let campaign = state
        .campaigns
        .create_campaign(NewCampaign {
            tag: input.tag,
            message: input.message,
            numbers: input.numbers,
            created_by: input.created_by.unwrap_or(Uuid::nil()),
            scheduled_for: input.scheduled_for,
        })
        .await
        .map_err(campaign_error)?;

    if dispatch_now {
        if let Err(e) = state
            .dispatch
            .start(campaign.id, CampaignStatus::Pending)
            .await
        {
            // Creation succeeded; the campaign stays pending and can be
            // dispatched again explicitly
            error!(campaign_id = %campaign.id, "Failed to start dispatch: {}", e);
        }
    }

    let campaign = state.campaigns.get(campaign.id).await.map_err(campaign_error)?;
    Ok((StatusCode::CREATED, Json(campaign.into())))
}

/// Get a campaign
///
/// GET /api/v1/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state.campaigns.get(id).await.map_err(campaign_error)?;
    Ok(Json(campaign.into()))
}

/// Get campaign statistics
///
/// GET /api/v1/campaigns/:id/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state.campaigns.stats(id).await.map_err(campaign_error)?;
    Ok(Json(stats.into()))
}

/// Start dispatching a pending campaign
///
/// POST /api/v1/campaigns/:id/dispatch
pub async fn dispatch_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .dispatch
        .start(id, CampaignStatus::Pending)
        .await
        .map_err(dispatch_error)?;

    info!(campaign_id = %id, "Campaign dispatch started");

    let campaign = state.campaigns.get(id).await.map_err(campaign_error)?;
    Ok(Json(campaign.into()))
}

/// Pause an in-progress campaign
///
/// POST /api/v1/campaigns/:id/pause
pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state.campaigns.pause(id).await.map_err(campaign_error)?;
    Ok(Json(campaign.into()))
}

/// Resume a paused campaign
///
/// POST /api/v1/campaigns/:id/resume
pub async fn resume_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .dispatch
        .start(id, CampaignStatus::Paused)
        .await
        .map_err(dispatch_error)?;

    let campaign = state.campaigns.get(id).await.map_err(campaign_error)?;
    Ok(Json(campaign.into()))
}

/// Cancel a campaign
///
/// POST /api/v1/campaigns/:id/cancel
pub async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state.campaigns.cancel(id).await.map_err(campaign_error)?;
    Ok(Json(campaign.into()))
}

/// Map a dispatch control error onto an HTTP response
fn dispatch_error(e: payamak_common::Error) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &e {
        payamak_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        payamak_common::Error::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_state"),
        _ => {
            error!("Dispatch error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: e.to_string(),
        }),
    )
}
