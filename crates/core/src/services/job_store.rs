//! Job store interface consumed by the worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use threadcast_common::AppResult;
use threadcast_db::entities::scheduled_post_job;
use threadcast_db::repositories::ScheduledPostJobRepository;

pub use threadcast_db::repositories::JobUpdate;

/// A scheduled post job as stored.
pub type Job = scheduled_post_job::Model;

/// Persistent collection of scheduled post jobs.
///
/// `try_claim` is the only concurrency control in the system: it must move a
/// job out of `pending` for at most one caller.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Pending jobs with `window_start <= scheduled_time <= now`, oldest first.
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Job>>;

    /// In-progress jobs with `window_start <= updated_at < threshold`.
    async fn list_stale_in_progress(
        &self,
        threshold: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Job>>;

    /// Conditionally move a job from `pending` to `in_progress`.
    async fn try_claim(&self, id: &str) -> AppResult<bool>;

    /// Reset a job to `pending` if it is still `in_progress` with
    /// `updated_at < threshold`. Returns whether it was reset.
    async fn release_stale(&self, id: &str, threshold: DateTime<Utc>) -> AppResult<bool>;

    /// Fetch a job by id.
    async fn get(&self, id: &str) -> AppResult<Option<Job>>;

    /// Apply `update` and bump `updated_at`.
    async fn update(&self, id: &str, update: JobUpdate) -> AppResult<()>;
}

#[async_trait]
impl JobStore for ScheduledPostJobRepository {
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Job>> {
        self.find_due(now, window_start, limit).await
    }

    async fn list_stale_in_progress(
        &self,
        threshold: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Job>> {
        self.find_stale_in_progress(threshold, window_start, limit)
            .await
    }

    async fn try_claim(&self, id: &str) -> AppResult<bool> {
        self.claim(id).await
    }

    async fn release_stale(&self, id: &str, threshold: DateTime<Utc>) -> AppResult<bool> {
        ScheduledPostJobRepository::release_stale(self, id, threshold).await
    }

    async fn get(&self, id: &str) -> AppResult<Option<Job>> {
        self.find_by_id(id).await
    }

    async fn update(&self, id: &str, update: JobUpdate) -> AppResult<()> {
        self.apply(id, update).await
    }
}
