//! API handlers

pub mod campaigns;
pub mod health;
pub mod segments;

use axum::http::StatusCode;
use axum::Json;
use payamak_core::CampaignError;
use serde::Serialize;
use tracing::error;

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Map a campaign service error onto an HTTP response
pub(crate) fn campaign_error(e: CampaignError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &e {
        CampaignError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        CampaignError::EmptyRecipientList | CampaignError::ScheduledInPast => {
            (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
        }
        CampaignError::NotAcceptingSegments | CampaignError::InvalidTransition(_) => {
            (StatusCode::CONFLICT, "invalid_state")
        }
        CampaignError::Database(err) => {
            error!("Database error: {}", err);
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
