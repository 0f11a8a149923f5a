//! Dispatch orchestration
//!
//! Owns the set of campaigns with a live dispatch task in this process and
//! spawns runner tasks. The in-process set is the fast guard against double
//! dispatch; the per-segment claim in storage is the backstop across
//! processes.

use payamak_common::config::DispatchConfig;
use payamak_common::types::CampaignId;
use payamak_common::{Error, Result};
use payamak_storage::models::CampaignStatus;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::runner::{DispatchRunner, RunOutcome};
use super::store::DispatchStore;
use crate::gateway::SmsGateway;

/// Spawns and tracks dispatch runs
pub struct DispatchService<S: DispatchStore> {
    store: Arc<S>,
    gateway: Arc<dyn SmsGateway>,
    config: DispatchConfig,
    running: Arc<Mutex<HashSet<Uuid>>>,
}

impl<S: DispatchStore> Clone for DispatchService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gateway: Arc::clone(&self.gateway),
            config: self.config.clone(),
            running: Arc::clone(&self.running),
        }
    }
}

impl<S: DispatchStore> DispatchService<S> {
    pub fn new(store: Arc<S>, gateway: Arc<dyn SmsGateway>, config: DispatchConfig) -> Self {
        Self {
            store,
            gateway,
            config,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether this process has a live run for the campaign
    pub fn is_running(&self, campaign_id: CampaignId) -> bool {
        self.running.lock().unwrap().contains(&campaign_id)
    }

    /// Move a campaign from `from` into in_progress and spawn its run.
    /// Returns the InvalidTransition error when another writer moved the
    /// campaign first.
    pub async fn start(&self, campaign_id: CampaignId, from: CampaignStatus) -> Result<()> {
        let moved = self
            .store
            .transition_campaign(campaign_id, from, CampaignStatus::InProgress)
            .await?;
        if !moved {
            return Err(Error::InvalidTransition(format!(
                "Campaign {} is no longer {}",
                campaign_id, from
            )));
        }

        self.spawn_run(campaign_id);
        Ok(())
    }

    /// Spawn a dispatch task for a campaign already in_progress. Returns
    /// None when a run is live in this process.
    pub fn spawn_run(&self, campaign_id: CampaignId) -> Option<JoinHandle<RunOutcome>> {
        {
            let mut running = self.running.lock().unwrap();
            if !running.insert(campaign_id) {
                warn!(campaign_id = %campaign_id, "Dispatch already running, not spawning");
                return None;
            }
        }

        let runner = DispatchRunner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.gateway),
            self.config.clone(),
        );
        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);

        let handle = tokio::spawn(async move {
            let outcome = match runner.run(campaign_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Control errors (storage broken, campaign gone) fail the
                    // campaign; delivery rejections never reach this path
                    error!(campaign_id = %campaign_id, "Dispatch run failed: {}", e);
                    if let Err(e) = store
                        .update_campaign_status(campaign_id, CampaignStatus::Failed)
                        .await
                    {
                        error!(campaign_id = %campaign_id, "Failed to mark campaign failed: {}", e);
                    }
                    running.lock().unwrap().remove(&campaign_id);
                    return RunOutcome::NothingToDo;
                }
            };

            info!(campaign_id = %campaign_id, ?outcome, "Dispatch run finished");
            running.lock().unwrap().remove(&campaign_id);
            outcome
        });

        Some(handle)
    }
}
