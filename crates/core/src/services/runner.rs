//! One worker invocation: reclaim, select, claim, publish.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use threadcast_common::config::WorkerSettings;
use threadcast_common::{AppError, AppResult};
use tracing::{debug, info};

use super::clock::{Clock, Delay, JitterSource};
use super::credentials::CredentialProvider;
use super::job_store::{Job, JobStore};
use super::publisher::PublishingClient;
use super::sequencer::{JobResult, PublishSequencer};

/// Summary returned to whoever triggered the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Jobs claimed and executed (zero or one).
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Stale in-progress jobs reset to pending.
    pub recovered: u32,
    pub results: Vec<JobResult>,
}

/// Processes at most one due job per call to [`PublishWorker::run_once`].
///
/// Holds no per-run state, so a single instance can serve concurrent
/// triggers. Only the store's conditional claim serializes them.
#[derive(Clone)]
pub struct PublishWorker {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    sequencer: PublishSequencer,
    settings: WorkerSettings,
}

impl PublishWorker {
    /// Create a new worker.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        publisher: Arc<dyn PublishingClient>,
        credentials: Arc<dyn CredentialProvider>,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn Delay>,
        jitter: Arc<dyn JitterSource>,
        settings: WorkerSettings,
    ) -> Self {
        let sequencer =
            PublishSequencer::new(store.clone(), publisher, credentials, delay, jitter, &settings);
        Self {
            store,
            clock,
            sequencer,
            settings,
        }
    }

    fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(i64::from(self.settings.lookback_hours))
    }

    /// Reset jobs stuck in `in_progress` past the staleness threshold.
    ///
    /// Returns how many jobs were recovered.
    pub async fn reclaim_stale(&self) -> AppResult<u32> {
        let now = self.clock.now();
        let stale_after = Duration::from_std(self.settings.stale_after())
            .map_err(|e| AppError::Config(format!("Invalid staleness threshold: {e}")))?;
        let threshold = now - stale_after;

        let stale = self
            .store
            .list_stale_in_progress(threshold, self.window_start(now), self.settings.scan_limit)
            .await?;

        let mut recovered = 0;
        for job in stale {
            if self.store.release_stale(&job.id, threshold).await? {
                info!(job_id = %job.id, updated_at = %job.updated_at, "Reclaimed stale job");
                recovered += 1;
            } else {
                debug!(job_id = %job.id, "Stale job was already reclaimed");
            }
        }
        Ok(recovered)
    }

    /// The pending job that has been due the longest, if any.
    pub async fn select_due(&self) -> AppResult<Option<Job>> {
        let now = self.clock.now();
        let due = self
            .store
            .list_due(now, self.window_start(now), self.settings.scan_limit)
            .await?;

        Ok(due.into_iter().min_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.id.cmp(&b.id))
        }))
    }

    /// Run one invocation.
    ///
    /// Per-job publish failures are reported inside the summary. Store
    /// failures abort the run and are returned as errors.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> AppResult<RunSummary> {
        let mut summary = RunSummary {
            recovered: self.reclaim_stale().await?,
            ..Default::default()
        };

        let Some(candidate) = self.select_due().await? else {
            info!(recovered = summary.recovered, "No due jobs");
            return Ok(summary);
        };

        if !self.store.try_claim(&candidate.id).await? {
            info!(job_id = %candidate.id, "Job was claimed by another invocation");
            return Ok(summary);
        }

        let job = self
            .store
            .get(&candidate.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Scheduled post job {}", candidate.id)))?;

        let result = self.sequencer.execute(job).await?;

        summary.processed = 1;
        if result.success {
            summary.succeeded = 1;
        } else {
            summary.failed = 1;
        }
        summary.results.push(result);

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            recovered = summary.recovered,
            "Run finished"
        );
        Ok(summary)
    }
}
