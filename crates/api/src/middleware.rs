//! Shared application state.

use std::sync::Arc;

use threadcast_core::PublishWorker;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Worker invoked by the trigger endpoint.
    pub worker: Arc<PublishWorker>,
    /// Bearer token the scheduler must present. `None` leaves the trigger open.
    pub cron_secret: Option<Arc<str>>,
}

impl AppState {
    /// Create application state.
    #[must_use]
    pub fn new(worker: Arc<PublishWorker>, cron_secret: Option<String>) -> Self {
        Self {
            worker,
            cron_secret: cron_secret.map(Arc::from),
        }
    }
}
