//! Health endpoint.

use axum::{Router, routing::get};
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Liveness report.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health() -> ApiResponse<HealthResponse> {
    ApiResponse::ok(HealthResponse { status: "ok" })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}
