//! Segment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use payamak_storage::models::{Segment, SegmentSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AppState;
use crate::handlers::{campaign_error, ErrorResponse};

/// Trimmed segment response for list views
#[derive(Debug, Serialize)]
pub struct SegmentSummaryResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub batch_number: i32,
    pub status: String,
    pub batch_size: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub http_status_code: Option<i32>,
    pub response_time_ms: Option<i64>,
    pub error_type: Option<String>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<SegmentSummary> for SegmentSummaryResponse {
    fn from(s: SegmentSummary) -> Self {
        Self {
            id: s.id,
            campaign_id: s.campaign_id,
            batch_number: s.batch_number,
            status: s.status,
            batch_size: s.batch_size,
            sent_count: s.sent_count,
            failed_count: s.failed_count,
            http_status_code: s.http_status_code,
            response_time_ms: s.response_time_ms,
            error_type: s.error_type,
            last_error: s.last_error,
            started_at: s.started_at,
            completed_at: s.completed_at,
        }
    }
}

/// Full segment response including the recorded exchange
#[derive(Debug, Serialize)]
pub struct SegmentDetailResponse {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub batch_number: i32,
    pub numbers: Vec<String>,
    pub status: String,
    pub sent_count: i32,
    pub failed_count: i32,
    pub message: Option<String>,
    pub tag: Option<String>,
    pub http_status_code: Option<i32>,
    pub response_time_ms: Option<i64>,
    pub request_size: Option<i64>,
    pub response_size: Option<i64>,
    pub api_request: Option<String>,
    pub api_response: Option<String>,
    pub error_type: Option<String>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Segment> for SegmentDetailResponse {
    fn from(s: Segment) -> Self {
        Self {
            id: s.id,
            campaign_id: s.campaign_id,
            batch_number: s.batch_number,
            numbers: s.numbers,
            status: s.status,
            sent_count: s.sent_count,
            failed_count: s.failed_count,
            message: s.message,
            tag: s.tag,
            http_status_code: s.http_status_code,
            response_time_ms: s.response_time_ms,
            request_size: s.request_size,
            response_size: s.response_size,
            api_request: s.api_request,
            api_response: s.api_response,
            error_type: s.error_type,
            last_error: s.last_error,
            started_at: s.started_at,
            completed_at: s.completed_at,
        }
    }
}

/// Request body for appending recipients
#[derive(Debug, Deserialize)]
pub struct AddSegmentsRequest {
    pub numbers: Vec<String>,
}

/// Response for appended recipients
#[derive(Debug, Serialize)]
pub struct AddSegmentsResponse {
    pub added_batches: usize,
    pub added_numbers: usize,
}

/// List a campaign's segments
///
/// GET /api/v1/campaigns/:id/segments
pub async fn list_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SegmentSummaryResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let segments = state.campaigns.segments(id).await.map_err(campaign_error)?;
    Ok(Json(
        segments
            .into_iter()
            .map(SegmentSummaryResponse::from)
            .collect(),
    ))
}

/// Append recipients to a campaign that has not started sending
///
/// POST /api/v1/campaigns/:id/segments
pub async fn add_segments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<AddSegmentsRequest>,
) -> Result<(StatusCode, Json<AddSegmentsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let segments = state
        .campaigns
        .add_segments(id, input.numbers)
        .await
        .map_err(campaign_error)?;

    let added_numbers = segments.iter().map(|s| s.numbers.len()).sum();

    Ok((
        StatusCode::CREATED,
        Json(AddSegmentsResponse {
            added_batches: segments.len(),
            added_numbers,
        }),
    ))
}

/// Get one segment with its full telemetry
///
/// GET /api/v1/segments/:id
pub async fn get_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SegmentDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let segment = state
        .campaigns
        .segment_detail(id)
        .await
        .map_err(campaign_error)?;
    Ok(Json(segment.into()))
}
