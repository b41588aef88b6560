//! Deterministic stand-ins for the worker's collaborators.
//!
//! Used by this crate's tests and by downstream crates that need a
//! [`PublishWorker`](crate::PublishWorker) without a database or network.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use threadcast_common::{AppError, AppResult};
use threadcast_db::entities::scheduled_post_job::JobStatus;

use crate::services::clock::{Clock, Delay, JitterSource, pick_millis};
use crate::services::credentials::{CredentialProvider, PublishingCredential};
use crate::services::job_store::{Job, JobStore, JobUpdate};
use crate::services::publisher::{PublishError, PublishingClient};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A pending job owned by `owner1` with main text `"A"` and no replies.
#[must_use]
pub fn job_fixture(id: &str, scheduled_time: DateTime<Utc>) -> Job {
    Job {
        id: id.to_string(),
        owner_id: "owner1".to_string(),
        scheduled_time: scheduled_time.into(),
        status: JobStatus::Pending,
        main_text: "A".to_string(),
        reply1_text: None,
        reply2_text: None,
        main_post_id: None,
        reply1_post_id: None,
        reply2_post_id: None,
        last_error: None,
        created_at: scheduled_time.into(),
        updated_at: scheduled_time.into(),
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start the clock at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = locked(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *locked(&self.now)
    }
}

/// Records every requested sleep and returns immediately.
///
/// When built with [`RecordingDelay::with_clock`] it also advances that clock,
/// so `updated_at` values reflect the time a real run would have taken.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    recorded: Mutex<Vec<Duration>>,
    clock: Option<Arc<ManualClock>>,
}

impl RecordingDelay {
    /// A delay that only records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A delay that records and advances `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self {
            recorded: Mutex::default(),
            clock: Some(clock),
        }
    }

    /// Durations slept so far, in order.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        locked(&self.recorded).clone()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn sleep(&self, duration: Duration) {
        locked(&self.recorded).push(duration);
        if let Some(clock) = &self.clock {
            if let Ok(step) = chrono::Duration::from_std(duration) {
                clock.advance(step);
            }
        }
    }
}

/// Reproducible jitter.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    /// Jitter drawn from an RNG seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn pick(&self, min: Duration, max: Duration) -> Duration {
        pick_millis(&mut *locked(&self.rng), min, max)
    }
}

/// A call received by [`ScriptedPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct PublishCall {
    pub platform_user_id: String,
    pub text: String,
    pub reply_to_id: Option<String>,
}

/// Publishing client that replays queued results.
///
/// Once the script runs out every call succeeds with `post-<n>`.
#[derive(Debug, Default)]
pub struct ScriptedPublisher {
    script: Mutex<VecDeque<Result<String, PublishError>>>,
    calls: Mutex<Vec<PublishCall>>,
    issued: AtomicU64,
}

impl ScriptedPublisher {
    /// A publisher with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next unscripted call.
    pub fn push(&self, result: Result<String, PublishError>) {
        locked(&self.script).push_back(result);
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PublishCall> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl PublishingClient for ScriptedPublisher {
    async fn create_post(
        &self,
        credential: &PublishingCredential,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError> {
        locked(&self.calls).push(PublishCall {
            platform_user_id: credential.platform_user_id.clone(),
            text: text.to_string(),
            reply_to_id: reply_to_id.map(str::to_string),
        });

        let scripted = locked(&self.script).pop_front();
        scripted.unwrap_or_else(|| {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("post-{n}"))
        })
    }
}

/// Fixed set of credentials keyed by owner.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    credentials: HashMap<String, PublishingCredential>,
}

impl StaticCredentials {
    /// No owner has a credential.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A single owner with a test token.
    #[must_use]
    pub fn for_owner(owner_id: &str) -> Self {
        let mut credentials = HashMap::new();
        credentials.insert(
            owner_id.to_string(),
            PublishingCredential {
                platform_user_id: format!("platform-{owner_id}"),
                access_token: "test-token".to_string(),
            },
        );
        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credential_for(&self, owner_id: &str) -> AppResult<Option<PublishingCredential>> {
        Ok(self.credentials.get(owner_id).cloned())
    }
}

/// Job store held in memory with the same conditional semantics as the
/// database repository.
pub struct InMemoryJobStore {
    jobs: Mutex<BTreeMap<String, Job>>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    update_budget: Mutex<Option<u32>>,
}

impl InMemoryJobStore {
    /// An empty store that stamps `updated_at` from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Mutex::default(),
            clock,
            unavailable: AtomicBool::new(false),
            update_budget: Mutex::new(None),
        }
    }

    /// Insert or replace a job as-is.
    pub fn insert(&self, job: Job) {
        locked(&self.jobs).insert(job.id.clone(), job);
    }

    /// Current stored copy of a job.
    #[must_use]
    pub fn snapshot(&self, id: &str) -> Option<Job> {
        locked(&self.jobs).get(id).cloned()
    }

    /// Make every operation fail with [`AppError::Database`].
    ///
    /// Passing `false` also lifts any limit set by
    /// [`fail_updates_after`](Self::fail_updates_after).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
        if !unavailable {
            *locked(&self.update_budget) = None;
        }
    }

    /// Let the next `successes` calls to `update` through, then fail every
    /// later one with [`AppError::Database`]. Other operations keep working.
    pub fn fail_updates_after(&self, successes: u32) {
        *locked(&self.update_budget) = Some(successes);
    }

    fn spend_update(&self) -> AppResult<()> {
        let mut budget = locked(&self.update_budget);
        match budget.as_mut() {
            Some(0) => Err(AppError::Database("job store write failed".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Database("job store unavailable".to_string()));
        }
        Ok(())
    }
}

fn set_once(slot: &mut Option<String>, value: Option<String>) -> bool {
    match value {
        Some(_) if slot.is_some() => false,
        Some(v) => {
            *slot = Some(v);
            true
        }
        None => true,
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn list_due(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Job>> {
        self.check_available()?;
        let mut due: Vec<Job> = locked(&self.jobs)
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| j.scheduled_time >= window_start && j.scheduled_time <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.scheduled_time
                .cmp(&b.scheduled_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }

    async fn list_stale_in_progress(
        &self,
        threshold: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<Job>> {
        self.check_available()?;
        let mut stale: Vec<Job> = locked(&self.jobs)
            .values()
            .filter(|j| j.status == JobStatus::InProgress)
            .filter(|j| j.updated_at < threshold && j.updated_at >= window_start)
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        stale.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(stale)
    }

    async fn try_claim(&self, id: &str) -> AppResult<bool> {
        self.check_available()?;
        let now = self.clock.now();
        let mut jobs = locked(&self.jobs);
        match jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::InProgress;
                job.updated_at = now.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stale(&self, id: &str, threshold: DateTime<Utc>) -> AppResult<bool> {
        self.check_available()?;
        let now = self.clock.now();
        let mut jobs = locked(&self.jobs);
        match jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::InProgress && job.updated_at < threshold => {
                job.status = JobStatus::Pending;
                job.updated_at = now.into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: &str) -> AppResult<Option<Job>> {
        self.check_available()?;
        Ok(self.snapshot(id))
    }

    async fn update(&self, id: &str, update: JobUpdate) -> AppResult<()> {
        self.check_available()?;
        self.spend_update()?;
        let now = self.clock.now();
        let mut jobs = locked(&self.jobs);
        let conflict = || AppError::Conflict(format!("Scheduled post job {id} was not updated"));

        let current = jobs.get(id).ok_or_else(conflict)?;
        let mut next = current.clone();
        let written = set_once(&mut next.main_post_id, update.main_post_id)
            && set_once(&mut next.reply1_post_id, update.reply1_post_id)
            && set_once(&mut next.reply2_post_id, update.reply2_post_id);
        if !written {
            return Err(conflict());
        }

        if let Some(status) = update.status {
            next.status = status;
        }
        if let Some(message) = update.last_error {
            next.last_error = Some(message);
        }
        next.updated_at = now.into();
        jobs.insert(id.to_string(), next);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store() -> (Arc<ManualClock>, InMemoryJobStore) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = InMemoryJobStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_claim_is_single_flight() {
        let (clock, store) = store();
        store.insert(job_fixture("job1", clock.now()));

        assert!(store.try_claim("job1").await.unwrap());
        assert!(!store.try_claim("job1").await.unwrap());
        assert!(!store.try_claim("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_step_id_cannot_be_overwritten() {
        let (clock, store) = store();
        store.insert(job_fixture("job1", clock.now()));

        let first = JobUpdate {
            main_post_id: Some("p1".to_string()),
            ..Default::default()
        };
        store.update("job1", first).await.unwrap();

        let second = JobUpdate {
            main_post_id: Some("p2".to_string()),
            status: Some(JobStatus::Posted),
            ..Default::default()
        };
        let result = store.update("job1", second).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let job = store.snapshot("job1").unwrap();
        assert_eq!(job.main_post_id.as_deref(), Some("p1"));
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_bumps_updated_at() {
        let (clock, store) = store();
        store.insert(job_fixture("job1", clock.now()));
        clock.advance(chrono::Duration::minutes(3));

        store
            .update("job1", JobUpdate::status(JobStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(store.snapshot("job1").unwrap().updated_at, clock.now());
    }

    #[tokio::test]
    async fn test_release_stale_skips_freshly_claimed_job() {
        let (clock, store) = store();
        let start = clock.now();
        store.insert(job_fixture("job1", start));
        assert!(store.try_claim("job1").await.unwrap());

        clock.advance(chrono::Duration::minutes(15));
        let threshold = clock.now() - chrono::Duration::minutes(10);
        let stale = store
            .list_stale_in_progress(threshold, clock.now() - chrono::Duration::hours(24), 10)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);

        // Another invocation resets and claims it before this one acts.
        assert!(store.release_stale("job1", threshold).await.unwrap());
        assert!(store.try_claim("job1").await.unwrap());

        assert!(!store.release_stale("job1", threshold).await.unwrap());
        assert_eq!(store.snapshot("job1").unwrap().status, JobStatus::InProgress);
    }

    #[tokio::test]
    async fn test_update_budget_fails_later_writes() {
        let (clock, store) = store();
        store.insert(job_fixture("job1", clock.now()));
        store.fail_updates_after(1);

        let first = JobUpdate {
            main_post_id: Some("p1".to_string()),
            ..Default::default()
        };
        store.update("job1", first).await.unwrap();
        let second = store
            .update("job1", JobUpdate::status(JobStatus::Posted))
            .await;
        assert!(matches!(second, Err(AppError::Database(_))));
        assert!(store.try_claim("job1").await.unwrap());

        store.set_unavailable(false);
        store
            .update("job1", JobUpdate::status(JobStatus::Posted))
            .await
            .unwrap();
        assert_eq!(store.snapshot("job1").unwrap().status, JobStatus::Posted);
    }

    #[tokio::test]
    async fn test_update_missing_job_conflicts() {
        let (_, store) = store();
        let result = store.update("nope", JobUpdate::failed("x")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_recording_delay_advances_clock() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let delay = RecordingDelay::with_clock(clock.clone());

        delay.sleep(Duration::from_secs(45)).await;
        assert_eq!(clock.now() - start, chrono::Duration::seconds(45));
        assert_eq!(delay.recorded(), vec![Duration::from_secs(45)]);
    }

    #[test]
    fn test_seeded_jitter_is_reproducible() {
        let min = Duration::from_secs(30);
        let max = Duration::from_secs(90);
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        for _ in 0..10 {
            assert_eq!(a.pick(min, max), b.pick(min, max));
        }
    }
}
