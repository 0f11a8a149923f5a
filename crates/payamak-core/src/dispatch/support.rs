//! In-memory test doubles for the dispatch loop

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use payamak_common::types::CampaignId;
use payamak_common::{Error, Result};
use payamak_storage::models::{
    Campaign, CampaignStats, CampaignStatus, FinalizeSegment, Segment, SegmentStatus, StatsUpdate,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::dispatch::DispatchStore;
use crate::gateway::{BatchResponse, SmsGateway};
use crate::segmenter;

#[derive(Default)]
struct MemoryInner {
    campaigns: HashMap<Uuid, Campaign>,
    segments: Vec<Segment>,
    stats: HashMap<Uuid, CampaignStats>,
}

/// In-memory DispatchStore mirroring the Postgres semantics, including the
/// guarded claims and the stats folding math
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a campaign with its segments built from `numbers`
    pub fn seed_campaign(
        &self,
        numbers: Vec<String>,
        status: CampaignStatus,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let batches = segmenter::partition(&numbers);

        let campaign = Campaign {
            id,
            tag: "test-tag".to_string(),
            message: "test message".to_string(),
            total_numbers: numbers.len() as i32,
            total_batches: batches.len() as i32,
            status: status.to_string(),
            created_by: Uuid::new_v4(),
            is_scheduled: scheduled_for.is_some(),
            scheduled_for,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        let mut inner = self.inner.lock().unwrap();
        for (i, batch) in batches.into_iter().enumerate() {
            inner.segments.push(Segment {
                id: Uuid::new_v4(),
                campaign_id: id,
                batch_number: i as i32 + 1,
                numbers: batch,
                status: SegmentStatus::Pending.to_string(),
                sent_count: 0,
                failed_count: 0,
                message: None,
                tag: None,
                http_status_code: None,
                response_time_ms: None,
                request_size: None,
                response_size: None,
                api_request: None,
                api_response: None,
                error_type: None,
                last_error: None,
                scheduled_for: None,
                created_at: now,
                updated_at: now,
                started_at: None,
                completed_at: None,
            });
        }
        inner.stats.insert(
            id,
            CampaignStats {
                campaign_id: id,
                total_sent: 0,
                total_success: 0,
                total_failed: 0,
                total_partial_success: 0,
                request_count: 0,
                total_response_time: 0,
                average_response_time: None,
                min_response_time: None,
                max_response_time: None,
                last_error: None,
                last_updated: now,
                last_success_at: None,
                last_failure_at: None,
            },
        );
        inner.campaigns.insert(id, campaign);
        id
    }

    pub fn set_status(&self, id: Uuid, status: CampaignStatus) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(c) = inner.campaigns.get_mut(&id) {
            c.status = status.to_string();
        }
    }

    pub fn campaign_status(&self, id: Uuid) -> Option<CampaignStatus> {
        let inner = self.inner.lock().unwrap();
        inner.campaigns.get(&id).and_then(|c| c.status.parse().ok())
    }

    pub fn segments_of(&self, id: Uuid) -> Vec<Segment> {
        let inner = self.inner.lock().unwrap();
        let mut segments: Vec<_> = inner
            .segments
            .iter()
            .filter(|s| s.campaign_id == id)
            .cloned()
            .collect();
        segments.sort_by_key(|s| s.batch_number);
        segments
    }

    pub fn stats_of(&self, id: Uuid) -> CampaignStats {
        let inner = self.inner.lock().unwrap();
        inner.stats.get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.campaigns.get(&id).cloned())
    }

    async fn update_campaign_status(&self, id: CampaignId, status: CampaignStatus) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let campaign = inner
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("campaign".to_string()))?;
        campaign.status = status.to_string();
        if status.is_terminal() {
            campaign.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn transition_campaign(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(campaign) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if campaign.status != from.to_string() {
            return Ok(false);
        }
        campaign.status = to.to_string();
        if to.is_terminal() {
            campaign.completed_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn pending_segments(&self, campaign_id: CampaignId, limit: i64) -> Result<Vec<Segment>> {
        let inner = self.inner.lock().unwrap();
        let mut pending: Vec<_> = inner
            .segments
            .iter()
            .filter(|s| s.campaign_id == campaign_id && s.status == "pending")
            .cloned()
            .collect();
        pending.sort_by_key(|s| s.batch_number);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn count_pending(&self, campaign_id: CampaignId) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .segments
            .iter()
            .filter(|s| s.campaign_id == campaign_id && s.status == "pending")
            .count() as i64)
    }

    async fn mark_in_progress(&self, segment_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(segment) = inner.segments.iter_mut().find(|s| s.id == segment_id) else {
            return Ok(false);
        };
        if segment.status != "pending" {
            return Ok(false);
        }
        segment.status = SegmentStatus::InProgress.to_string();
        segment.started_at = Some(Utc::now());
        segment.last_error = None;
        Ok(true)
    }

    async fn finalize_segment(&self, segment_id: Uuid, outcome: FinalizeSegment) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(segment) = inner.segments.iter_mut().find(|s| s.id == segment_id) else {
            return Ok(false);
        };
        if segment.status != "in_progress" {
            return Ok(false);
        }
        segment.status = outcome
            .status
            .unwrap_or(SegmentStatus::Failed)
            .to_string();
        segment.sent_count = outcome.sent_count as i32;
        segment.failed_count = outcome.failed_count as i32;
        segment.last_error = outcome.last_error;
        segment.error_type = outcome.error_type;
        if outcome.message.is_some() {
            segment.message = outcome.message;
        }
        if outcome.tag.is_some() {
            segment.tag = outcome.tag;
        }
        segment.http_status_code = outcome.http_status_code;
        segment.response_time_ms = outcome.response_time_ms;
        segment.request_size = outcome.request_size;
        segment.response_size = outcome.response_size;
        segment.api_request = outcome.api_request;
        segment.api_response = outcome.api_response;
        segment.completed_at = Some(Utc::now());
        Ok(true)
    }

    async fn record_outcome(&self, campaign_id: CampaignId, update: StatsUpdate) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let stats = inner
            .stats
            .get_mut(&campaign_id)
            .ok_or_else(|| Error::NotFound("stats".to_string()))?;

        stats.total_sent += update.sent;
        stats.total_success += update.success;
        stats.total_failed += update.failed;
        stats.total_partial_success += update.partial_success;
        if let Some(rt) = update.response_time_ms {
            stats.total_response_time += rt;
            stats.average_response_time =
                Some(stats.total_response_time as f64 / (stats.request_count + 1) as f64);
            stats.min_response_time = Some(stats.min_response_time.map_or(rt, |m| m.min(rt)));
            stats.max_response_time = Some(stats.max_response_time.map_or(rt, |m| m.max(rt)));
        }
        stats.request_count += 1;
        if let Some(err) = update.error_message {
            stats.last_error = Some(err);
        }
        if update.is_success {
            stats.last_success_at = Some(Utc::now());
        } else {
            stats.last_failure_at = Some(Utc::now());
        }
        stats.last_updated = Utc::now();
        Ok(())
    }

    async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<_> = inner
            .campaigns
            .values()
            .filter(|c| {
                c.status == "scheduled" && c.scheduled_for.map(|t| t <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|c| c.scheduled_for);
        Ok(due)
    }

    async fn resumable_campaigns(&self) -> Result<Vec<Campaign>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .campaigns
            .values()
            .filter(|c| {
                c.status == "in_progress"
                    && inner
                        .segments
                        .iter()
                        .any(|s| s.campaign_id == c.id && s.status == "pending")
            })
            .cloned()
            .collect())
    }

    async fn requeue_in_progress(&self, campaign_id: CampaignId) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut requeued = 0;
        for segment in inner
            .segments
            .iter_mut()
            .filter(|s| s.campaign_id == campaign_id && s.status == "in_progress")
        {
            segment.status = SegmentStatus::Pending.to_string();
            segment.started_at = None;
            requeued += 1;
        }
        Ok(requeued)
    }
}

/// Scripted gateway outcome, keyed on the first number of the batch
#[derive(Clone)]
pub enum FakeOutcome {
    Success,
    ApiRejection(String),
    NetworkError(String),
}

type SendHook = Box<dyn Fn(usize) + Send + Sync>;

/// Fake gateway: success by default, with per-batch scripted outcomes and
/// an optional hook fired on every call (used to cancel mid-run)
#[derive(Default)]
pub struct FakeGateway {
    by_first_number: Mutex<HashMap<String, FakeOutcome>>,
    calls: Mutex<Vec<usize>>,
    on_send: Option<SendHook>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        Self {
            on_send: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    /// Script the outcome for the batch starting with `first_number`
    pub fn script(&self, first_number: &str, outcome: FakeOutcome) {
        self.by_first_number
            .lock()
            .unwrap()
            .insert(first_number.to_string(), outcome);
    }

    /// Batch sizes seen, in call order
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send_batch(
        &self,
        numbers: &[String],
        _message: &str,
        _tag: &str,
    ) -> Result<BatchResponse> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(numbers.len());
            calls.len()
        };
        if let Some(hook) = &self.on_send {
            hook(call_index);
        }

        let outcome = numbers
            .first()
            .and_then(|n| self.by_first_number.lock().unwrap().get(n).cloned())
            .unwrap_or(FakeOutcome::Success);

        match outcome {
            FakeOutcome::Success => Ok(BatchResponse {
                is_success: true,
                http_status: 200,
                api_status: Some(true),
                api_status_code: Some(0),
                api_message: Some("queued".to_string()),
                response_time_ms: 120,
                request_body: "{}".to_string(),
                response_body: r#"{"status":true}"#.to_string(),
            }),
            FakeOutcome::ApiRejection(message) => Ok(BatchResponse {
                is_success: false,
                http_status: 200,
                api_status: Some(false),
                api_status_code: Some(41),
                api_message: Some(message),
                response_time_ms: 95,
                request_body: "{}".to_string(),
                response_body: r#"{"status":false}"#.to_string(),
            }),
            FakeOutcome::NetworkError(message) => Err(Error::Network(message)),
        }
    }
}

/// Build a list of n distinct test numbers
pub fn test_numbers(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("98912{:07}", i)).collect()
}
