//! Authentication module

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use payamak_core::dispatch::{DispatchService, PgDispatchStore};
use payamak_core::CampaignService;
use payamak_storage::DatabasePool;
use std::sync::Arc;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabasePool,
    pub campaigns: CampaignService,
    pub dispatch: DispatchService<PgDispatchStore>,
    /// Static bearer token; None disables authentication
    pub auth_token: Option<String>,
}

/// Extract the bearer token from a request
pub fn extract_token(req: &Request) -> Option<&str> {
    // Authorization: Bearer <token>
    if let Some(auth) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token);
            }
        }
    }

    // X-API-Key header
    if let Some(key) = req.headers().get("x-api-key") {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str);
        }
    }

    None
}

/// Authentication middleware: compares the request token against the
/// configured static token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Health check endpoints stay open
    if request.uri().path().starts_with("/health") {
        return Ok(next.run(request).await);
    }

    let Some(expected) = &state.auth_token else {
        return Ok(next.run(request).await);
    };

    let token = extract_token(&request).ok_or_else(|| {
        warn!("Missing token in request to {}", request.uri().path());
        StatusCode::UNAUTHORIZED
    })?;

    if token != expected {
        warn!("Token mismatch for request to {}", request.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::extract_token;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn extracts_bearer_token() {
        let req = Request::builder()
            .header("authorization", "Bearer secret-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req), Some("secret-token"));
    }

    #[test]
    fn extracts_api_key_header() {
        let req = Request::builder()
            .header("x-api-key", "secret-token")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_token(&req), Some("secret-token"));
    }

    #[test]
    fn missing_token_is_none() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_token(&req), None);
    }
}
