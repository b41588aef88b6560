//! HTTP trigger surface for threadcast.
//!
//! Exposes the worker to external schedulers:
//!
//! - `GET|POST /cron/publish` runs one invocation and returns its summary
//! - `GET /health` reports liveness
//!
//! The server binary nests this router under `/api`.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
