//! Worker services.

#![allow(missing_docs)]

pub mod clock;
pub mod credentials;
pub mod job_store;
pub mod publisher;
pub mod retry;
pub mod runner;
pub mod sequencer;

pub use clock::{Clock, Delay, JitterSource, SystemClock, ThreadRngJitter, TokioDelay};
pub use credentials::{CredentialProvider, DbCredentialProvider, PublishingCredential};
pub use job_store::{Job, JobStore, JobUpdate};
pub use publisher::{PublishError, PublishingClient, ThreadsClient};
pub use retry::RetryPolicy;
pub use runner::{PublishWorker, RunSummary};
pub use sequencer::{JobResult, PublishSequencer, ThreadState, ThreadStep};
