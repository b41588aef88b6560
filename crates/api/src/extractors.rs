//! Request extractors.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use threadcast_common::AppError;

use crate::middleware::AppState;

/// Proof that the request came from the configured scheduler.
///
/// Checks `Authorization: Bearer <cron_secret>` when a secret is configured.
#[derive(Debug, Clone, Copy)]
pub struct CronCaller;

impl FromRequestParts<AppState> for CronCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.cron_secret.as_deref() else {
            return Ok(Self);
        };

        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match presented {
            Some(token) if token == secret => Ok(Self),
            _ => {
                tracing::warn!("Rejected trigger request with missing or wrong secret");
                Err(AppError::Unauthorized)
            }
        }
    }
}
