//! Publishing credential lookup.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use threadcast_common::AppResult;
use threadcast_db::entities::publishing_credential;
use threadcast_db::repositories::PublishingCredentialRepository;

use super::clock::Clock;

/// What the publishing client needs to act for an owner.
#[derive(Clone, PartialEq, Eq)]
pub struct PublishingCredential {
    /// The owner's user id on the publishing platform.
    pub platform_user_id: String,
    /// OAuth access token.
    pub access_token: String,
}

impl fmt::Debug for PublishingCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishingCredential")
            .field("platform_user_id", &self.platform_user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl From<publishing_credential::Model> for PublishingCredential {
    fn from(model: publishing_credential::Model) -> Self {
        Self {
            platform_user_id: model.platform_user_id,
            access_token: model.access_token,
        }
    }
}

/// Resolves the credential used to publish an owner's jobs.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A currently valid credential, or `None` when the owner has none.
    async fn credential_for(&self, owner_id: &str) -> AppResult<Option<PublishingCredential>>;
}

/// Reads credentials from the `publishing_credential` table.
///
/// A stored token whose `expires_at` has passed counts as missing.
#[derive(Clone)]
pub struct DbCredentialProvider {
    repo: PublishingCredentialRepository,
    clock: Arc<dyn Clock>,
}

impl DbCredentialProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new(repo: PublishingCredentialRepository, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }
}

#[async_trait]
impl CredentialProvider for DbCredentialProvider {
    async fn credential_for(&self, owner_id: &str) -> AppResult<Option<PublishingCredential>> {
        let Some(model) = self.repo.find_by_owner(owner_id).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if model.expires_at.is_some_and(|at| at <= now) {
            tracing::debug!(owner_id, "Stored publishing credential has expired");
            return Ok(None);
        }

        Ok(Some(model.into()))
    }
}
