//! Publishing API client.
//!
//! [`PublishingClient`] is the seam the sequencer calls for every step.
//! [`ThreadsClient`] implements it against the Threads Graph API, which
//! publishes in two phases: a media container is created first, then
//! published by id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use threadcast_common::config::PublisherSettings;
use threadcast_common::{AppError, AppResult};

use super::credentials::PublishingCredential;

/// Failure of a single publish call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Network trouble or rate limiting; worth another attempt.
    #[error("transient publish failure: {0}")]
    Transient(String),

    /// Rejected by the platform, or retries are exhausted.
    #[error("publish failed: {0}")]
    Terminal(String),

    /// The owner has no valid publishing credential.
    #[error("no valid publishing credential for owner {0}")]
    CredentialMissing(String),
}

impl PublishError {
    /// Whether the retry engine should try again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Creates posts on the external platform.
#[async_trait]
pub trait PublishingClient: Send + Sync {
    /// Publish `text`, optionally as a reply, and return the new post id.
    async fn create_post(
        &self,
        credential: &PublishingCredential,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError>;
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

/// Threads Graph API client.
#[derive(Debug, Clone)]
pub struct ThreadsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ThreadsClient {
    /// Create a client from publisher settings.
    pub fn new(settings: &PublisherSettings) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, PublishError> {
        let response = self
            .http_client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| PublishError::Transient(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Threads API error: {status} - {body}");
            return Err(if is_retryable(status) {
                PublishError::Transient(message)
            } else {
                PublishError::Terminal(message)
            });
        }

        let parsed: IdResponse = response.json().await.map_err(|e| {
            PublishError::Terminal(format!("Failed to parse Threads response: {e}"))
        })?;
        Ok(parsed.id)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl PublishingClient for ThreadsClient {
    async fn create_post(
        &self,
        credential: &PublishingCredential,
        text: &str,
        reply_to_id: Option<&str>,
    ) -> Result<String, PublishError> {
        let user = &credential.platform_user_id;
        let token = credential.access_token.as_str();

        let mut container = vec![("media_type", "TEXT"), ("text", text)];
        if let Some(parent) = reply_to_id {
            container.push(("reply_to_id", parent));
        }
        container.push(("access_token", token));

        let creation_id = self
            .post_form(&format!("{}/{user}/threads", self.base_url), &container)
            .await?;

        self.post_form(
            &format!("{}/{user}/threads_publish", self.base_url),
            &[("creation_id", creation_id.as_str()), ("access_token", token)],
        )
        .await
    }
}
