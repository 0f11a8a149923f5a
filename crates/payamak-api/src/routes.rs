//! API routes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, AppState};
use crate::handlers::{campaigns, health, segments};

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .with_state(state.clone());

    // Campaign routes
    let campaign_routes = Router::new()
        .route("/", get(campaigns::list_campaigns))
        .route("/", post(campaigns::create_campaign))
        .route("/scheduled", get(campaigns::list_scheduled))
        .route("/:id", get(campaigns::get_campaign))
        .route("/:id/stats", get(campaigns::get_stats))
        .route("/:id/dispatch", post(campaigns::dispatch_campaign))
        .route("/:id/pause", post(campaigns::pause_campaign))
        .route("/:id/resume", post(campaigns::resume_campaign))
        .route("/:id/cancel", post(campaigns::cancel_campaign))
        .route("/:id/segments", get(segments::list_segments))
        .route("/:id/segments", post(segments::add_segments));

    // Segment routes
    let segment_routes = Router::new().route("/:id", get(segments::get_segment));

    let api_routes = Router::new()
        .nest("/campaigns", campaign_routes)
        .nest("/segments", segment_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
