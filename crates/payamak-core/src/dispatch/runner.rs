//! Wave-based dispatch loop
//!
//! A run drains a campaign's pending segments in waves of at most
//! `concurrency_limit` gateway calls. Control state (pause, cancel) is
//! re-read at every wave boundary, so a wave in flight always settles
//! before the run reacts.

use payamak_common::config::DispatchConfig;
use payamak_common::types::CampaignId;
use payamak_common::Result;
use payamak_storage::models::{
    Campaign, CampaignStatus, FinalizeSegment, Segment, SegmentStatus, StatsUpdate,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::store::DispatchStore;
use crate::gateway::{BatchResponse, SmsGateway};

const API_ERROR: &str = "API_ERROR";
const NETWORK_ERROR: &str = "NETWORK_ERROR";

/// How a dispatch run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every segment reached a terminal state
    Completed,
    /// A pause request stopped the run between waves
    Paused,
    /// A cancel request stopped the run between waves
    Cancelled,
    /// The campaign was not dispatchable (already terminal, or gone)
    NothingToDo,
}

/// Drives one campaign through the wave loop
pub struct DispatchRunner<S: DispatchStore> {
    store: Arc<S>,
    gateway: Arc<dyn SmsGateway>,
    config: DispatchConfig,
}

impl<S: DispatchStore> DispatchRunner<S> {
    pub fn new(store: Arc<S>, gateway: Arc<dyn SmsGateway>, config: DispatchConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Run the campaign to a stopping point. The campaign must already be
    /// in_progress; the caller owns that transition.
    pub async fn run(&self, campaign_id: CampaignId) -> Result<RunOutcome> {
        // A missing campaign is nothing to do, not an error to raise
        let Some(campaign) = self.store.campaign(campaign_id).await? else {
            warn!(campaign_id = %campaign_id, "Campaign not found, nothing to dispatch");
            return Ok(RunOutcome::NothingToDo);
        };

        info!(
            campaign_id = %campaign_id,
            total_batches = campaign.total_batches,
            "Dispatch run starting"
        );

        let limit = self.config.concurrency_limit.max(1);

        loop {
            // Control state is only consulted between waves
            let Some(current) = self.store.campaign(campaign_id).await? else {
                warn!(campaign_id = %campaign_id, "Campaign vanished mid-run, stopping");
                return Ok(RunOutcome::NothingToDo);
            };

            match current.status_enum() {
                Some(CampaignStatus::InProgress) => {}
                Some(CampaignStatus::Cancelled) => {
                    info!(campaign_id = %campaign_id, "Dispatch run stopped: cancelled");
                    return Ok(RunOutcome::Cancelled);
                }
                Some(CampaignStatus::Paused) => {
                    info!(campaign_id = %campaign_id, "Dispatch run stopped: paused");
                    return Ok(RunOutcome::Paused);
                }
                _ => {
                    warn!(
                        campaign_id = %campaign_id,
                        status = %current.status,
                        "Dispatch run found campaign in non-runnable state"
                    );
                    return Ok(RunOutcome::NothingToDo);
                }
            }

            let wave = self
                .store
                .pending_segments(campaign_id, limit as i64)
                .await?;

            if wave.is_empty() {
                // Guarded so a cancel racing the last wave wins
                let completed = self
                    .store
                    .transition_campaign(
                        campaign_id,
                        CampaignStatus::InProgress,
                        CampaignStatus::Completed,
                    )
                    .await?;
                if completed {
                    info!(campaign_id = %campaign_id, "Campaign completed");
                    return Ok(RunOutcome::Completed);
                }
                continue;
            }

            debug!(
                campaign_id = %campaign_id,
                wave_size = wave.len(),
                "Dispatching wave"
            );

            let mut join_set: JoinSet<(Segment, Result<BatchResponse>, i64)> = JoinSet::new();

            for segment in wave {
                // Another dispatcher may hold this segment already
                if !self.store.mark_in_progress(segment.id).await? {
                    debug!(segment_id = %segment.id, "Segment already claimed, skipping");
                    continue;
                }

                let gateway = Arc::clone(&self.gateway);
                let message = campaign.message.clone();
                let tag = campaign.tag.clone();

                join_set.spawn(async move {
                    let started = Instant::now();
                    let result = gateway.send_batch(&segment.numbers, &message, &tag).await;
                    let elapsed_ms = started.elapsed().as_millis() as i64;
                    (segment, result, elapsed_ms)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((segment, result, elapsed_ms)) => {
                        self.settle(&campaign, segment, result, elapsed_ms).await
                    }
                    Err(e) => error!(campaign_id = %campaign_id, "Dispatch task panicked: {}", e),
                }
            }

            if self.config.inter_wave_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_wave_delay_ms)).await;
            }
        }
    }

    /// Persist one segment's outcome and fold it into the campaign stats.
    /// `total_sent` counts attempted numbers, so every branch contributes the
    /// batch size to it. Store failures here are logged, never propagated:
    /// one segment's bookkeeping must not abort the rest of the run.
    async fn settle(
        &self,
        campaign: &Campaign,
        segment: Segment,
        result: Result<BatchResponse>,
        elapsed_ms: i64,
    ) {
        let batch_size = segment.numbers.len() as i64;

        let (outcome, update) = match result {
            Ok(response) if response.is_success => {
                let outcome = FinalizeSegment {
                    status: Some(SegmentStatus::Sent),
                    sent_count: batch_size,
                    message: Some(campaign.message.clone()),
                    tag: Some(campaign.tag.clone()),
                    http_status_code: Some(response.http_status as i32),
                    response_time_ms: Some(response.response_time_ms),
                    request_size: Some(response.request_size()),
                    response_size: Some(response.response_size()),
                    api_request: Some(response.request_body.clone()),
                    api_response: Some(response.response_body.clone()),
                    ..Default::default()
                };
                let update = StatsUpdate {
                    sent: batch_size,
                    success: batch_size,
                    failed: 0,
                    partial_success: 0,
                    response_time_ms: Some(response.response_time_ms),
                    error_message: None,
                    is_success: true,
                };
                (outcome, update)
            }
            Ok(response) => {
                let reason = response
                    .api_message
                    .clone()
                    .unwrap_or_else(|| format!("Gateway rejected batch (HTTP {})", response.http_status));
                warn!(
                    segment_id = %segment.id,
                    http_status = response.http_status,
                    "Segment rejected by gateway: {}",
                    reason
                );
                let outcome = FinalizeSegment {
                    status: Some(SegmentStatus::Failed),
                    failed_count: batch_size,
                    last_error: Some(reason.clone()),
                    error_type: Some(API_ERROR.to_string()),
                    message: Some(campaign.message.clone()),
                    tag: Some(campaign.tag.clone()),
                    http_status_code: Some(response.http_status as i32),
                    response_time_ms: Some(response.response_time_ms),
                    request_size: Some(response.request_size()),
                    response_size: Some(response.response_size()),
                    api_request: Some(response.request_body.clone()),
                    api_response: Some(response.response_body.clone()),
                    ..Default::default()
                };
                let update = StatsUpdate {
                    sent: batch_size,
                    success: 0,
                    failed: batch_size,
                    partial_success: 0,
                    response_time_ms: Some(response.response_time_ms),
                    error_message: Some(reason),
                    is_success: false,
                };
                (outcome, update)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(segment_id = %segment.id, "Segment failed before the gateway answered: {}", reason);
                // No response arrived, so no HTTP status or body to record;
                // the time spent on the attempt still feeds the aggregates
                let outcome = FinalizeSegment {
                    status: Some(SegmentStatus::Failed),
                    failed_count: batch_size,
                    last_error: Some(reason.clone()),
                    error_type: Some(NETWORK_ERROR.to_string()),
                    message: Some(campaign.message.clone()),
                    tag: Some(campaign.tag.clone()),
                    response_time_ms: Some(elapsed_ms),
                    ..Default::default()
                };
                let update = StatsUpdate {
                    sent: batch_size,
                    success: 0,
                    failed: batch_size,
                    partial_success: 0,
                    response_time_ms: Some(elapsed_ms),
                    error_message: Some(reason),
                    is_success: false,
                };
                (outcome, update)
            }
        };

        if let Err(e) = self.store.finalize_segment(segment.id, outcome).await {
            error!(segment_id = %segment.id, "Failed to finalize segment: {}", e);
        }
        if let Err(e) = self.store.record_outcome(campaign.id, update).await {
            error!(campaign_id = %campaign.id, "Failed to record stats: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::support::{test_numbers, FakeGateway, FakeOutcome, MemoryStore};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn runner(
        store: &MemoryStore,
        gateway: FakeGateway,
        limit: usize,
    ) -> DispatchRunner<MemoryStore> {
        DispatchRunner::new(
            Arc::new(store.clone()),
            Arc::new(gateway),
            DispatchConfig {
                concurrency_limit: limit,
                inter_wave_delay_ms: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_full_campaign_delivery() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(250), CampaignStatus::InProgress, None);

        let gateway = FakeGateway::new();
        let outcome = runner(&store, gateway, 3).run(id).await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Completed));

        let segments = store.segments_of(id);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].numbers.len(), 100);
        assert_eq!(segments[2].numbers.len(), 50);
        for segment in &segments {
            assert_eq!(segment.status, "sent");
            assert_eq!(segment.sent_count as usize, segment.numbers.len());
            assert_eq!(segment.http_status_code, Some(200));
            assert!(segment.completed_at.is_some());
        }

        let stats = store.stats_of(id);
        assert_eq!(stats.total_sent, 250);
        assert_eq!(stats.total_success, 250);
        assert_eq!(stats.total_failed, 0);
        assert_eq!(stats.request_count, 3);
        assert!(stats.last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_all_rejections_still_complete() {
        let store = MemoryStore::new();
        let numbers = test_numbers(150);
        let id = store.seed_campaign(numbers.clone(), CampaignStatus::InProgress, None);

        let gateway = FakeGateway::new();
        gateway.script(&numbers[0], FakeOutcome::ApiRejection("no credit".to_string()));
        gateway.script(&numbers[100], FakeOutcome::ApiRejection("no credit".to_string()));

        let outcome = runner(&store, gateway, 3).run(id).await.unwrap();

        // Rejection is a delivery outcome, not a run failure
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Completed));

        let segments = store.segments_of(id);
        for segment in &segments {
            assert_eq!(segment.status, "failed");
            assert_eq!(segment.error_type.as_deref(), Some("API_ERROR"));
            assert_eq!(segment.last_error.as_deref(), Some("no credit"));
            assert_eq!(segment.failed_count as usize, segment.numbers.len());
        }

        // Rejected numbers were still attempted, so they count toward
        // total_sent and the success/failed split covers all of it
        let stats = store.stats_of(id);
        assert_eq!(stats.total_sent, 150);
        assert_eq!(stats.total_success, 0);
        assert_eq!(stats.total_failed, 150);
        assert_eq!(stats.total_success + stats.total_failed, stats.total_sent);
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.last_error.as_deref(), Some("no credit"));
        assert!(stats.last_failure_at.is_some());
    }

    #[tokio::test]
    async fn test_network_error_isolated_to_one_segment() {
        let store = MemoryStore::new();
        let numbers = test_numbers(250);
        let id = store.seed_campaign(numbers.clone(), CampaignStatus::InProgress, None);

        let gateway = FakeGateway::new();
        // Second batch starts at number index 100
        gateway.script(
            &numbers[100],
            FakeOutcome::NetworkError("connection reset".to_string()),
        );

        let outcome = runner(&store, gateway, 3).run(id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let segments = store.segments_of(id);
        assert_eq!(segments[0].status, "sent");
        assert_eq!(segments[1].status, "failed");
        assert_eq!(segments[1].error_type.as_deref(), Some("NETWORK_ERROR"));
        // A call that never completed leaves no HTTP telemetry, but the
        // attempt's elapsed time is still measured
        assert_eq!(segments[1].http_status_code, None);
        assert!(segments[1].response_time_ms.is_some());
        assert_eq!(segments[2].status, "sent");

        let stats = store.stats_of(id);
        assert_eq!(stats.total_sent, 250);
        assert_eq!(stats.total_success, 150);
        assert_eq!(stats.total_failed, 100);
        assert_eq!(stats.request_count, 3);
        // Two completed calls at 120ms plus whatever the failed attempt took
        assert!(stats.total_response_time >= 240);
    }

    #[tokio::test]
    async fn test_network_error_keeps_average_consistent() {
        let store = MemoryStore::new();
        let numbers = test_numbers(100);
        let id = store.seed_campaign(numbers.clone(), CampaignStatus::InProgress, None);

        let gateway = FakeGateway::new();
        gateway.script(
            &numbers[0],
            FakeOutcome::NetworkError("connection refused".to_string()),
        );

        runner(&store, gateway, 1).run(id).await.unwrap();

        // Every request folds its elapsed time in, so the average never
        // drifts from total / count
        let stats = store.stats_of(id);
        assert_eq!(stats.request_count, 1);
        assert_eq!(
            stats.average_response_time,
            Some(stats.total_response_time as f64 / stats.request_count as f64)
        );
    }

    #[tokio::test]
    async fn test_cancellation_halts_future_waves() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(500), CampaignStatus::InProgress, None);

        // Cancel after the first wave's calls have gone out
        let hook_store = store.clone();
        let gateway = FakeGateway::with_hook(move |call_index| {
            if call_index == 2 {
                hook_store.set_status(id, CampaignStatus::Cancelled);
            }
        });

        let outcome = runner(&store, gateway, 2).run(id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Cancelled));

        let segments = store.segments_of(id);
        // The in-flight wave settled, the rest never started
        let sent = segments.iter().filter(|s| s.status == "sent").count();
        let pending = segments.iter().filter(|s| s.status == "pending").count();
        assert_eq!(sent, 2);
        assert_eq!(pending, 3);
    }

    #[tokio::test]
    async fn test_pause_stops_between_waves() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(400), CampaignStatus::InProgress, None);

        let hook_store = store.clone();
        let gateway = FakeGateway::with_hook(move |call_index| {
            if call_index == 2 {
                hook_store.set_status(id, CampaignStatus::Paused);
            }
        });

        let outcome = runner(&store, gateway, 2).run(id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Paused);

        let segments = store.segments_of(id);
        let sent = segments.iter().filter(|s| s.status == "sent").count();
        let pending = segments.iter().filter(|s| s.status == "pending").count();
        assert_eq!(sent, 2);
        assert_eq!(pending, 2);

        // A resumed run picks up exactly the remaining segments
        store.set_status(id, CampaignStatus::InProgress);
        let outcome = runner(&store, FakeGateway::new(), 2).run(id).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(store.stats_of(id).total_sent, 400);
    }

    #[tokio::test]
    async fn test_claimed_segment_not_dispatched_twice() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(100), CampaignStatus::InProgress, None);

        let segments = store.segments_of(id);
        assert!(store.mark_in_progress(segments[0].id).await.unwrap());
        // Second claim loses
        assert!(!store.mark_in_progress(segments[0].id).await.unwrap());
    }

    #[tokio::test]
    async fn test_wave_size_never_exceeds_limit() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(700), CampaignStatus::InProgress, None);

        let gateway = FakeGateway::new();
        let runner = DispatchRunner::new(
            Arc::new(store.clone()),
            Arc::new(gateway),
            DispatchConfig {
                concurrency_limit: 3,
                inter_wave_delay_ms: 0,
            },
        );
        runner.run(id).await.unwrap();

        // 7 segments through waves of 3
        let segments = store.segments_of(id);
        assert_eq!(segments.len(), 7);
        assert!(segments.iter().all(|s| s.status == "sent"));
    }

    #[tokio::test]
    async fn test_run_on_missing_campaign_is_nothing_to_do() {
        let store = MemoryStore::new();
        let gateway = FakeGateway::new();
        let outcome = runner(&store, gateway, 3).run(Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, RunOutcome::NothingToDo);
    }

    #[tokio::test]
    async fn test_stats_additive_across_runs() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(300), CampaignStatus::InProgress, None);

        let numbers = test_numbers(300);
        let gateway = FakeGateway::new();
        gateway.script(
            &numbers[200],
            FakeOutcome::ApiRejection("throttled".to_string()),
        );

        runner(&store, gateway, 1).run(id).await.unwrap();

        let stats = store.stats_of(id);
        assert_eq!(stats.total_sent, 300);
        assert_eq!(stats.total_success, 200);
        assert_eq!(stats.total_failed, 100);
        assert_eq!(stats.request_count, 3);
        assert_eq!(
            stats.total_success + stats.total_failed,
            stats.total_sent,
            "every attempted number settles exactly once"
        );
        assert_eq!(stats.min_response_time, Some(95));
        assert_eq!(stats.max_response_time, Some(120));
        let avg = stats.average_response_time.unwrap();
        assert!((avg - (120.0 + 120.0 + 95.0) / 3.0).abs() < 1e-9);
    }
}
