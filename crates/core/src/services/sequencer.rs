//! Multi-step thread publishing.
//!
//! A thread is a main post followed by up to two replies. Progress lives
//! entirely in the job's step identifiers, so a resumed job skips every step
//! that already has one.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use threadcast_common::AppResult;
use threadcast_common::config::WorkerSettings;
use threadcast_db::entities::scheduled_post_job::JobStatus;
use tracing::{info, warn};

use super::clock::{Delay, JitterSource};
use super::credentials::CredentialProvider;
use super::job_store::{Job, JobStore, JobUpdate};
use super::publisher::{PublishError, PublishingClient};
use super::retry::RetryPolicy;

/// One publish call in a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStep {
    Main,
    Reply1,
    Reply2,
}

impl ThreadStep {
    /// Name used in logs and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Reply1 => "reply1",
            Self::Reply2 => "reply2",
        }
    }

    fn text(self, job: &Job) -> &str {
        match self {
            Self::Main => &job.main_text,
            Self::Reply1 => job.reply1_text.as_deref().unwrap_or_default(),
            Self::Reply2 => job.reply2_text.as_deref().unwrap_or_default(),
        }
    }

    /// The most recently established post this step replies to.
    fn reply_to(self, job: &Job) -> Option<String> {
        match self {
            Self::Main => None,
            Self::Reply1 => job.main_post_id.clone(),
            Self::Reply2 => job
                .reply1_post_id
                .clone()
                .or_else(|| job.main_post_id.clone()),
        }
    }

    fn record(self, post_id: String) -> JobUpdate {
        let mut update = JobUpdate::default();
        match self {
            Self::Main => update.main_post_id = Some(post_id),
            Self::Reply1 => update.reply1_post_id = Some(post_id),
            Self::Reply2 => update.reply2_post_id = Some(post_id),
        }
        update
    }

    fn apply(self, job: &mut Job, post_id: String) {
        match self {
            Self::Main => job.main_post_id = Some(post_id),
            Self::Reply1 => job.reply1_post_id = Some(post_id),
            Self::Reply2 => job.reply2_post_id = Some(post_id),
        }
    }
}

/// Progress of a thread, derived from which step identifiers are set.
///
/// A reply with empty text counts as done without ever being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    NotStarted,
    MainPosted,
    Reply1Posted,
    Done,
}

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}

impl ThreadState {
    /// Derive the state of `job`.
    #[must_use]
    pub fn of(job: &Job) -> Self {
        if job.main_post_id.is_none() {
            Self::NotStarted
        } else if has_text(job.reply1_text.as_deref()) && job.reply1_post_id.is_none() {
            Self::MainPosted
        } else if has_text(job.reply2_text.as_deref()) && job.reply2_post_id.is_none() {
            Self::Reply1Posted
        } else {
            Self::Done
        }
    }

    /// The step that moves the thread out of this state.
    #[must_use]
    pub const fn next_step(self) -> Option<ThreadStep> {
        match self {
            Self::NotStarted => Some(ThreadStep::Main),
            Self::MainPosted => Some(ThreadStep::Reply1),
            Self::Reply1Posted => Some(ThreadStep::Reply2),
            Self::Done => None,
        }
    }
}

/// Outcome of processing one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply1_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply2_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResult {
    fn from_job(job: &Job, error: Option<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            success: error.is_none(),
            main_post_id: job.main_post_id.clone(),
            reply1_post_id: job.reply1_post_id.clone(),
            reply2_post_id: job.reply2_post_id.clone(),
            error,
        }
    }
}

/// Drives a claimed job through its remaining steps.
#[derive(Clone)]
pub struct PublishSequencer {
    store: Arc<dyn JobStore>,
    publisher: Arc<dyn PublishingClient>,
    credentials: Arc<dyn CredentialProvider>,
    delay: Arc<dyn Delay>,
    jitter: Arc<dyn JitterSource>,
    retry: RetryPolicy,
    jitter_min: Duration,
    jitter_max: Duration,
}

impl PublishSequencer {
    /// Create a new sequencer.
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        publisher: Arc<dyn PublishingClient>,
        credentials: Arc<dyn CredentialProvider>,
        delay: Arc<dyn Delay>,
        jitter: Arc<dyn JitterSource>,
        settings: &WorkerSettings,
    ) -> Self {
        Self {
            store,
            publisher,
            credentials,
            delay,
            jitter,
            retry: RetryPolicy::from_settings(settings),
            jitter_min: Duration::from_secs(settings.jitter_min_secs),
            jitter_max: Duration::from_secs(settings.jitter_max_secs),
        }
    }

    /// Publish every remaining step of `job`, then mark it `posted`.
    ///
    /// A [`PublishError`] marks the job `failed` and is reported in the
    /// returned result. Store errors propagate; identifiers already written
    /// stay in place.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn execute(&self, mut job: Job) -> AppResult<JobResult> {
        if ThreadState::of(&job).next_step().is_some() {
            let Some(credential) = self.credentials.credential_for(&job.owner_id).await? else {
                let err = PublishError::CredentialMissing(job.owner_id.clone());
                return self.fail(&mut job, &err).await;
            };

            let mut previous_executed = false;
            while let Some(step) = ThreadState::of(&job).next_step() {
                if previous_executed {
                    let pause = self.jitter.pick(self.jitter_min, self.jitter_max);
                    info!(
                        step = step.name(),
                        delay_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
                        "Pausing before next step"
                    );
                    self.delay.sleep(pause).await;
                }

                let text = step.text(&job).to_string();
                let reply_to = step.reply_to(&job);
                let published = self
                    .retry
                    .run(self.delay.as_ref(), step.name(), |_| {
                        self.publisher
                            .create_post(&credential, &text, reply_to.as_deref())
                    })
                    .await;

                match published {
                    Ok(post_id) => {
                        self.store
                            .update(&job.id, step.record(post_id.clone()))
                            .await?;
                        info!(step = step.name(), post_id = %post_id, "Published step");
                        step.apply(&mut job, post_id);
                        previous_executed = true;
                    }
                    Err(err) => return self.fail(&mut job, &err).await,
                }
            }
        }

        self.store
            .update(&job.id, JobUpdate::status(JobStatus::Posted))
            .await?;
        job.status = JobStatus::Posted;
        info!("Thread published");
        Ok(JobResult::from_job(&job, None))
    }

    async fn fail(&self, job: &mut Job, err: &PublishError) -> AppResult<JobResult> {
        let message = err.to_string();
        warn!(error = %message, "Publishing failed");
        self.store
            .update(&job.id, JobUpdate::failed(message.clone()))
            .await?;
        job.status = JobStatus::Failed;
        job.last_error = Some(message.clone());
        Ok(JobResult::from_job(job, Some(message)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{
        InMemoryJobStore, ManualClock, RecordingDelay, ScriptedPublisher, SeededJitter,
        StaticCredentials, job_fixture,
    };
    use chrono::{Duration as ChronoDuration, Utc};

    struct Harness {
        store: Arc<InMemoryJobStore>,
        publisher: Arc<ScriptedPublisher>,
        delay: Arc<RecordingDelay>,
        sequencer: PublishSequencer,
    }

    fn harness(credentials: StaticCredentials) -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(InMemoryJobStore::new(clock));
        let publisher = Arc::new(ScriptedPublisher::new());
        let delay = Arc::new(RecordingDelay::new());
        let sequencer = PublishSequencer::new(
            store.clone(),
            publisher.clone(),
            Arc::new(credentials),
            delay.clone(),
            Arc::new(SeededJitter::new(7)),
            &WorkerSettings::default(),
        );
        Harness {
            store,
            publisher,
            delay,
            sequencer,
        }
    }

    fn in_progress(id: &str, reply1: &str, reply2: &str) -> Job {
        let mut job = job_fixture(id, Utc::now() - ChronoDuration::minutes(1));
        job.status = JobStatus::InProgress;
        job.reply1_text = Some(reply1.to_string());
        job.reply2_text = Some(reply2.to_string());
        job
    }

    #[test]
    fn test_state_derivation() {
        let mut job = in_progress("j", "B", "C");
        assert_eq!(ThreadState::of(&job), ThreadState::NotStarted);
        job.main_post_id = Some("m".to_string());
        assert_eq!(ThreadState::of(&job), ThreadState::MainPosted);
        job.reply1_post_id = Some("r1".to_string());
        assert_eq!(ThreadState::of(&job), ThreadState::Reply1Posted);
        job.reply2_post_id = Some("r2".to_string());
        assert_eq!(ThreadState::of(&job), ThreadState::Done);
        assert_eq!(ThreadState::Done.next_step(), None);
    }

    #[test]
    fn test_empty_replies_are_skipped() {
        let mut job = in_progress("j", "", "   ");
        job.main_post_id = Some("m".to_string());
        assert_eq!(ThreadState::of(&job), ThreadState::Done);

        let mut job = in_progress("j", "", "C");
        job.main_post_id = Some("m".to_string());
        assert_eq!(ThreadState::of(&job).next_step(), Some(ThreadStep::Reply2));
        assert_eq!(ThreadStep::Reply2.reply_to(&job).as_deref(), Some("m"));
    }

    #[tokio::test]
    async fn test_full_thread_chains_replies() {
        let h = harness(StaticCredentials::for_owner("owner1"));
        let job = in_progress("job1", "B", "C");
        h.store.insert(job.clone());

        let result = h.sequencer.execute(job).await.unwrap();

        assert!(result.success);
        let calls = h.publisher.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].reply_to_id, None);
        assert_eq!(calls[1].reply_to_id, result.main_post_id);
        assert_eq!(calls[2].reply_to_id, result.reply1_post_id);

        let stored = h.store.snapshot("job1").unwrap();
        assert_eq!(stored.status, JobStatus::Posted);
        assert!(stored.reply2_post_id.is_some());

        let pauses = h.delay.recorded();
        assert_eq!(pauses.len(), 2);
        for pause in pauses {
            assert!(pause >= Duration::from_secs(30) && pause <= Duration::from_secs(90));
        }
    }

    #[tokio::test]
    async fn test_terminal_failure_keeps_earlier_ids() {
        let h = harness(StaticCredentials::for_owner("owner1"));
        h.publisher.push(Ok("main-1".to_string()));
        h.publisher
            .push(Err(PublishError::Terminal("text too long".to_string())));
        let job = in_progress("job1", "B", "C");
        h.store.insert(job.clone());

        let result = h.sequencer.execute(job).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.main_post_id.as_deref(), Some("main-1"));
        assert!(result.error.unwrap().contains("text too long"));

        let stored = h.store.snapshot("job1").unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.main_post_id.as_deref(), Some("main-1"));
        assert!(stored.reply1_post_id.is_none());
        assert!(stored.last_error.is_some());
        assert_eq!(h.publisher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_calls() {
        let h = harness(StaticCredentials::none());
        let job = in_progress("job1", "B", "");
        h.store.insert(job.clone());

        let result = h.sequencer.execute(job).await.unwrap();

        assert!(!result.success);
        assert!(h.publisher.calls().is_empty());
        assert!(h.delay.recorded().is_empty());
        assert_eq!(h.store.snapshot("job1").unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_completed_job_needs_no_credential() {
        let h = harness(StaticCredentials::none());
        let mut job = in_progress("job1", "B", "");
        job.main_post_id = Some("m".to_string());
        job.reply1_post_id = Some("r1".to_string());
        h.store.insert(job.clone());

        let result = h.sequencer.execute(job).await.unwrap();

        assert!(result.success);
        assert!(h.publisher.calls().is_empty());
        assert_eq!(h.store.snapshot("job1").unwrap().status, JobStatus::Posted);
    }

    #[tokio::test]
    async fn test_resume_pauses_only_between_executed_steps() {
        let h = harness(StaticCredentials::for_owner("owner1"));
        let mut job = in_progress("job1", "B", "C");
        job.main_post_id = Some("m".to_string());
        h.store.insert(job.clone());

        h.sequencer.execute(job).await.unwrap();

        let calls = h.publisher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].reply_to_id.as_deref(), Some("m"));
        // reply1 runs straight away; only reply2 waits
        assert_eq!(h.delay.recorded().len(), 1);
    }
}
