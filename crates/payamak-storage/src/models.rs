//! Row models for campaigns, segments, and stats

use chrono::{DateTime, Utc};
use payamak_common::types::{CampaignId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Scheduled,
    InProgress,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl CampaignStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Failed | CampaignStatus::Cancelled
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Pending => write!(f, "pending"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::InProgress => write!(f, "in_progress"),
            CampaignStatus::Paused => write!(f, "paused"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
            CampaignStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "in_progress" => Ok(CampaignStatus::InProgress),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Segment dispatch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    Pending,
    InProgress,
    Sent,
    Failed,
    Paused,
}

impl std::fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentStatus::Pending => write!(f, "pending"),
            SegmentStatus::InProgress => write!(f, "in_progress"),
            SegmentStatus::Sent => write!(f, "sent"),
            SegmentStatus::Failed => write!(f, "failed"),
            SegmentStatus::Paused => write!(f, "paused"),
        }
    }
}

impl std::str::FromStr for SegmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SegmentStatus::Pending),
            "in_progress" => Ok(SegmentStatus::InProgress),
            "sent" => Ok(SegmentStatus::Sent),
            "failed" => Ok(SegmentStatus::Failed),
            "paused" => Ok(SegmentStatus::Paused),
            _ => Err(format!("Invalid segment status: {}", s)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tag: String,
    pub message: String,
    pub total_numbers: i32,
    pub total_batches: i32,
    pub status: String,
    pub created_by: UserId,
    pub is_scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }
}

/// Campaign row joined with headline stats, for list views
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignWithStats {
    pub id: CampaignId,
    pub tag: String,
    pub message: String,
    pub total_numbers: i32,
    pub total_batches: i32,
    pub status: String,
    pub is_scheduled: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_sent: i64,
    pub total_success: i64,
    pub total_failed: i64,
    pub request_count: i64,
    pub average_response_time: Option<f64>,
}

/// Create campaign input
#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub tag: String,
    pub message: String,
    pub total_numbers: i32,
    pub total_batches: i32,
    pub status: CampaignStatus,
    pub created_by: UserId,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Segment model: one ≤100-number batch of a campaign, including the full
/// delivery telemetry recorded at finalize time
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub campaign_id: CampaignId,
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
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Segment {
    /// Get status enum
    pub fn status_enum(&self) -> Option<SegmentStatus> {
        self.status.parse().ok()
    }
}

/// Trimmed segment projection for list views (heavy payload columns omitted)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub id: Uuid,
    pub campaign_id: CampaignId,
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

/// Create segment input
#[derive(Debug, Clone)]
pub struct CreateSegment {
    pub campaign_id: CampaignId,
    pub batch_number: i32,
    pub numbers: Vec<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Terminal outcome written to a segment at finalize time
#[derive(Debug, Clone, Default)]
pub struct FinalizeSegment {
    pub status: Option<SegmentStatus>,
    pub sent_count: i64,
    pub failed_count: i64,
    pub last_error: Option<String>,
    pub error_type: Option<String>,
    pub message: Option<String>,
    pub tag: Option<String>,
    pub http_status_code: Option<i32>,
    pub response_time_ms: Option<i64>,
    pub request_size: Option<i64>,
    pub response_size: Option<i64>,
    pub api_request: Option<String>,
    pub api_response: Option<String>,
}

impl FinalizeSegment {
    /// Outcome for a fully delivered segment
    pub fn sent(count: i64) -> Self {
        Self {
            status: Some(SegmentStatus::Sent),
            sent_count: count,
            ..Default::default()
        }
    }

    /// Outcome for a failed segment
    pub fn failed(count: i64, error_type: &str, last_error: impl Into<String>) -> Self {
        Self {
            status: Some(SegmentStatus::Failed),
            failed_count: count,
            error_type: Some(error_type.to_string()),
            last_error: Some(last_error.into()),
            ..Default::default()
        }
    }
}

/// Campaign statistics row (1:1 with campaign)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_id: CampaignId,
    pub total_sent: i64,
    pub total_success: i64,
    pub total_failed: i64,
    pub total_partial_success: i64,
    pub request_count: i64,
    pub total_response_time: i64,
    pub average_response_time: Option<f64>,
    pub min_response_time: Option<i64>,
    pub max_response_time: Option<i64>,
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// One gateway-call outcome applied to a campaign's stats
#[derive(Debug, Clone)]
pub struct StatsUpdate {
    pub sent: i64,
    pub success: i64,
    pub failed: i64,
    pub partial_success: i64,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub is_success: bool,
}
