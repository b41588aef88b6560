//! Publishing credential repository.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait};
use threadcast_common::{AppError, AppResult};

use crate::entities::{PublishingCredential, publishing_credential};

/// Publishing credential repository for database operations.
#[derive(Clone)]
pub struct PublishingCredentialRepository {
    db: Arc<DatabaseConnection>,
}

impl PublishingCredentialRepository {
    /// Create a new publishing credential repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the credential stored for an owner.
    pub async fn find_by_owner(
        &self,
        owner_id: &str,
    ) -> AppResult<Option<publishing_credential::Model>> {
        PublishingCredential::find_by_id(owner_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a credential, replacing the token of an existing one.
    pub async fn upsert(&self, model: publishing_credential::ActiveModel) -> AppResult<()> {
        PublishingCredential::insert(model)
            .on_conflict(
                OnConflict::column(publishing_credential::Column::OwnerId)
                    .update_columns([
                        publishing_credential::Column::PlatformUserId,
                        publishing_credential::Column::AccessToken,
                        publishing_credential::Column::ExpiresAt,
                        publishing_credential::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_credential(owner_id: &str) -> publishing_credential::Model {
        publishing_credential::Model {
            owner_id: owner_id.to_string(),
            platform_user_id: "1789".to_string(),
            access_token: "token".to_string(),
            expires_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_owner() {
        let credential = create_test_credential("owner1");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[credential.clone()]])
                .into_connection(),
        );

        let repo = PublishingCredentialRepository::new(db);
        let result = repo.find_by_owner("owner1").await.unwrap();
        assert_eq!(result, Some(credential));
    }

    #[tokio::test]
    async fn test_find_by_owner_missing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<publishing_credential::Model>::new()])
                .into_connection(),
        );

        let repo = PublishingCredentialRepository::new(db);
        assert!(repo.find_by_owner("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PublishingCredentialRepository::new(db);
        let now = Utc::now();
        let model = publishing_credential::ActiveModel {
            owner_id: Set("owner1".to_string()),
            platform_user_id: Set("1789".to_string()),
            access_token: Set("token".to_string()),
            expires_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        assert!(repo.upsert(model).await.is_ok());
    }
}
