//! Database entities.

pub mod publishing_credential;
pub mod scheduled_post_job;

pub use publishing_credential::Entity as PublishingCredential;
pub use scheduled_post_job::Entity as ScheduledPostJob;
