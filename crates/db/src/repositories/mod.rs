//! Database repositories.

mod publishing_credential;
mod scheduled_post_job;

pub use publishing_credential::PublishingCredentialRepository;
pub use scheduled_post_job::{JobUpdate, ScheduledPostJobRepository};
