//! Scheduler trigger endpoint.

use axum::{Router, extract::State, routing::get};
use threadcast_common::AppResult;
use threadcast_core::RunSummary;

use crate::{extractors::CronCaller, middleware::AppState, response::ApiResponse};

/// Run the worker once and report what it did.
async fn publish(
    _caller: CronCaller,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<RunSummary>> {
    let summary = state.worker.run_once().await?;
    Ok(ApiResponse::ok(summary))
}

pub fn router() -> Router<AppState> {
    // GET is accepted for schedulers that cannot send POST.
    Router::new().route("/publish", get(publish).post(publish))
}
