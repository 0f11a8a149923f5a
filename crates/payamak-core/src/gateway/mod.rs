//! SMS gateway client

pub mod client;

pub use client::OkitClient;

use async_trait::async_trait;
use payamak_common::Result;

/// Completed gateway exchange for one segment. Network failures never
/// produce one of these; they surface as [`payamak_common::Error::Network`].
#[derive(Debug, Clone)]
pub struct BatchResponse {
    /// HTTP 2xx and body status == true
    pub is_success: bool,
    pub http_status: u16,
    /// `status` field of the gateway body, when the body parsed
    pub api_status: Option<bool>,
    /// Gateway-level status code from the body
    pub api_status_code: Option<i64>,
    /// Human-readable gateway message
    pub api_message: Option<String>,
    pub response_time_ms: i64,
    pub request_body: String,
    pub response_body: String,
}

impl BatchResponse {
    pub fn request_size(&self) -> i64 {
        self.request_body.len() as i64
    }

    pub fn response_size(&self) -> i64 {
        self.response_body.len() as i64
    }
}

/// Gateway seam for the dispatch loop
#[async_trait]
pub trait SmsGateway: Send + Sync + 'static {
    /// Send one batch of numbers. Ok carries the full exchange whether the
    /// gateway accepted or rejected it; Err means the exchange never
    /// completed (timeout, connect failure).
    async fn send_batch(&self, numbers: &[String], message: &str, tag: &str)
        -> Result<BatchResponse>;
}
