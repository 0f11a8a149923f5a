//! Scheduler worker
//!
//! Periodically fires scheduled campaigns whose time has come and re-spawns
//! interrupted runs found after a restart.

use chrono::Utc;
use payamak_common::{Error, Result};
use payamak_storage::models::CampaignStatus;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use crate::dispatch::{DispatchService, DispatchStore};

/// Scheduler worker
pub struct SchedulerWorker<S: DispatchStore> {
    store: Arc<S>,
    dispatch: DispatchService<S>,
    poll_interval_secs: u64,
}

impl<S: DispatchStore> SchedulerWorker<S> {
    pub fn new(store: Arc<S>, dispatch: DispatchService<S>, poll_interval_secs: u64) -> Self {
        Self {
            store,
            dispatch,
            poll_interval_secs,
        }
    }

    /// Run the scheduler loop
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs(self.poll_interval_secs));

        info!(
            poll_interval_secs = self.poll_interval_secs,
            "Scheduler worker started"
        );

        loop {
            ticker.tick().await;

            if let Err(e) = self.run_once().await {
                error!("Scheduler pass failed: {}", e);
            }
        }
    }

    /// One scheduler pass: fire due campaigns, then resume interrupted ones
    pub async fn run_once(&self) -> Result<()> {
        self.fire_due_campaigns().await?;
        self.resume_interrupted().await?;
        Ok(())
    }

    async fn fire_due_campaigns(&self) -> Result<()> {
        let due = self.store.due_scheduled(Utc::now()).await?;

        for campaign in due {
            info!(
                campaign_id = %campaign.id,
                scheduled_for = ?campaign.scheduled_for,
                "Firing scheduled campaign"
            );

            // The guarded transition re-checks state at fire time, so a
            // campaign cancelled while waiting never sends
            match self
                .dispatch
                .start(campaign.id, CampaignStatus::Scheduled)
                .await
            {
                Ok(()) => {}
                Err(Error::InvalidTransition(_)) => {
                    warn!(
                        campaign_id = %campaign.id,
                        "Scheduled campaign changed state before firing, skipping"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    async fn resume_interrupted(&self) -> Result<()> {
        let resumable = self.store.resumable_campaigns().await?;

        for campaign in resumable {
            if self.dispatch.is_running(campaign.id) {
                continue;
            }

            let requeued = self.store.requeue_in_progress(campaign.id).await?;
            if requeued > 0 {
                info!(
                    campaign_id = %campaign.id,
                    requeued,
                    "Requeued segments from an interrupted run"
                );
            }

            info!(campaign_id = %campaign.id, "Resuming interrupted campaign");
            self.dispatch.spawn_run(campaign.id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::support::{test_numbers, FakeGateway, MemoryStore};
    use payamak_common::config::DispatchConfig;
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;
    use std::sync::Arc as StdArc;

    fn worker(
        store: &MemoryStore,
        gateway: StdArc<FakeGateway>,
    ) -> SchedulerWorker<MemoryStore> {
        let dispatch = DispatchService::new(
            StdArc::new(store.clone()),
            gateway,
            DispatchConfig {
                concurrency_limit: 3,
                inter_wave_delay_ms: 0,
            },
        );
        SchedulerWorker::new(StdArc::new(store.clone()), dispatch, 30)
    }

    async fn drain(worker: &SchedulerWorker<MemoryStore>, id: uuid::Uuid) {
        while worker.dispatch.is_running(id) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_due_campaign_fires() {
        let store = MemoryStore::new();
        let fire_time = Utc::now() - ChronoDuration::minutes(1);
        let id = store.seed_campaign(
            test_numbers(150),
            CampaignStatus::Scheduled,
            Some(fire_time),
        );

        let gateway = StdArc::new(FakeGateway::new());
        let worker = worker(&store, StdArc::clone(&gateway));

        worker.run_once().await.unwrap();
        drain(&worker, id).await;

        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Completed));
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_future_campaign_does_not_fire() {
        let store = MemoryStore::new();
        let fire_time = Utc::now() + ChronoDuration::hours(1);
        let id = store.seed_campaign(
            test_numbers(100),
            CampaignStatus::Scheduled,
            Some(fire_time),
        );

        let gateway = StdArc::new(FakeGateway::new());
        let worker = worker(&store, StdArc::clone(&gateway));

        worker.run_once().await.unwrap();

        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Scheduled));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_never_sends() {
        let store = MemoryStore::new();
        let fire_time = Utc::now() - ChronoDuration::minutes(1);
        let id = store.seed_campaign(
            test_numbers(200),
            CampaignStatus::Scheduled,
            Some(fire_time),
        );

        store.set_status(id, CampaignStatus::Cancelled);

        let gateway = StdArc::new(FakeGateway::new());
        let worker = worker(&store, StdArc::clone(&gateway));

        worker.run_once().await.unwrap();

        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Cancelled));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_campaign_resumes() {
        let store = MemoryStore::new();
        let id = store.seed_campaign(test_numbers(300), CampaignStatus::InProgress, None);

        // Simulate a crash mid-run: first segment stuck in_progress
        let segments = store.segments_of(id);
        store.mark_in_progress(segments[0].id).await.unwrap();

        let gateway = StdArc::new(FakeGateway::new());
        let worker = worker(&store, StdArc::clone(&gateway));

        worker.run_once().await.unwrap();
        drain(&worker, id).await;

        assert_eq!(store.campaign_status(id), Some(CampaignStatus::Completed));
        // All three segments delivered, including the requeued one
        assert_eq!(store.stats_of(id).total_sent, 300);
    }
}
