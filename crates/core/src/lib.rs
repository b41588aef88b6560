//! Scheduled thread publishing for threadcast.
//!
//! [`PublishWorker::run_once`] is the single entry point: it reclaims stale
//! jobs, claims the oldest due one and publishes its thread.

pub mod services;
pub mod testing;

pub use services::*;
