//! OkitSMS HTTP client

use async_trait::async_trait;
use payamak_common::config::GatewayConfig;
use payamak_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{BatchResponse, SmsGateway};

/// Request body for the bulk send endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendRequest<'a> {
    source_number: &'a str,
    destination_numbers: &'a [String],
    message: &'a str,
    user_tag: &'a str,
}

/// Gateway response body. Unknown shapes are tolerated; every field is
/// optional so a partial body still yields telemetry.
#[derive(Debug, Clone, Deserialize)]
struct SendResponse {
    status: Option<bool>,
    #[serde(rename = "statusCode")]
    status_code: Option<i64>,
    message: Option<String>,
}

/// OkitSMS gateway client
#[derive(Clone)]
pub struct OkitClient {
    http_client: Client,
    config: GatewayConfig,
}

impl OkitClient {
    /// Create a new gateway client from configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl SmsGateway for OkitClient {
    async fn send_batch(
        &self,
        numbers: &[String],
        message: &str,
        tag: &str,
    ) -> Result<BatchResponse> {
        let request = SendRequest {
            source_number: &self.config.source_number,
            destination_numbers: numbers,
            message,
            user_tag: tag,
        };

        let request_body = serde_json::to_string(&request)
            .map_err(|e| Error::Internal(format!("Failed to encode request: {}", e)))?;

        debug!(
            endpoint = %self.config.endpoint,
            batch_size = numbers.len(),
            "Sending batch to gateway"
        );

        let started = Instant::now();
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("X-API-KEY", &self.config.api_key)
            .header("Content-Type", "application/json")
            .body(request_body.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("Gateway request failed: {}", e)))?;

        let http_status = response.status().as_u16();
        let response_body = response
            .text()
            .await
            .map_err(|e| Error::Network(format!("Failed to read gateway response: {}", e)))?;
        let response_time_ms = started.elapsed().as_millis() as i64;

        let parsed: Option<SendResponse> = serde_json::from_str(&response_body).ok();
        if parsed.is_none() {
            warn!(http_status, "Gateway returned an unparseable body");
        }

        let api_status = parsed.as_ref().and_then(|p| p.status);
        let is_success = (200..300).contains(&http_status) && api_status == Some(true);

        Ok(BatchResponse {
            is_success,
            http_status,
            api_status,
            api_status_code: parsed.as_ref().and_then(|p| p.status_code),
            api_message: parsed.and_then(|p| p.message),
            response_time_ms,
            request_body,
            response_body,
        })
    }
}
