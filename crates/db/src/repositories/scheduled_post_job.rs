//! Scheduled post job repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use threadcast_common::{AppError, AppResult};

use crate::entities::scheduled_post_job::JobStatus;
use crate::entities::{ScheduledPostJob, scheduled_post_job};

/// A partial update applied to a single job.
///
/// `updated_at` is always bumped. Each step identifier is only written when the
/// stored column is still NULL, so a published step can never be overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    /// New status.
    pub status: Option<JobStatus>,
    /// Identifier of the published primary post.
    pub main_post_id: Option<String>,
    /// Identifier of the published first reply.
    pub reply1_post_id: Option<String>,
    /// Identifier of the published second reply.
    pub reply2_post_id: Option<String>,
    /// Message of a terminal failure.
    pub last_error: Option<String>,
}

impl JobUpdate {
    /// Change only the status.
    #[must_use]
    pub const fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            main_post_id: None,
            reply1_post_id: None,
            reply2_post_id: None,
            last_error: None,
        }
    }

    /// Move the job to `failed` and record why.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            last_error: Some(message.into()),
            ..Self::status(JobStatus::Failed)
        }
    }

    /// Whether this update writes at least one step identifier.
    #[must_use]
    pub const fn writes_step_id(&self) -> bool {
        self.main_post_id.is_some() || self.reply1_post_id.is_some() || self.reply2_post_id.is_some()
    }
}

/// Scheduled post job repository for database operations.
#[derive(Clone)]
pub struct ScheduledPostJobRepository {
    db: Arc<DatabaseConnection>,
}

impl ScheduledPostJobRepository {
    /// Create a new scheduled post job repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<scheduled_post_job::Model>> {
        ScheduledPostJob::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Pending jobs scheduled inside `[window_start, now]`, oldest first.
    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<scheduled_post_job::Model>> {
        ScheduledPostJob::find()
            .filter(scheduled_post_job::Column::Status.eq(JobStatus::Pending))
            .filter(scheduled_post_job::Column::ScheduledTime.gte(window_start))
            .filter(scheduled_post_job::Column::ScheduledTime.lte(now))
            .order_by_asc(scheduled_post_job::Column::ScheduledTime)
            .order_by_asc(scheduled_post_job::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// In-progress jobs last touched inside `[window_start, threshold)`.
    ///
    /// The window applies to `updated_at`, not `scheduled_time`: a job claimed
    /// near the edge of the due window must still be found once it goes stale.
    pub async fn find_stale_in_progress(
        &self,
        threshold: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<scheduled_post_job::Model>> {
        ScheduledPostJob::find()
            .filter(scheduled_post_job::Column::Status.eq(JobStatus::InProgress))
            .filter(scheduled_post_job::Column::UpdatedAt.lt(threshold))
            .filter(scheduled_post_job::Column::UpdatedAt.gte(window_start))
            .order_by_asc(scheduled_post_job::Column::UpdatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically move a job from `pending` to `in_progress`.
    ///
    /// Returns `false` when another invocation claimed it first.
    pub async fn claim(&self, id: &str) -> AppResult<bool> {
        let result = ScheduledPostJob::update_many()
            .col_expr(
                scheduled_post_job::Column::Status,
                Expr::value(JobStatus::InProgress),
            )
            .col_expr(scheduled_post_job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(scheduled_post_job::Column::Id.eq(id))
            .filter(scheduled_post_job::Column::Status.eq(JobStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    /// Reset a stale job to `pending`.
    ///
    /// Only matches while the job is still `in_progress` and untouched since
    /// `threshold`, so a job another invocation has just reclaimed and claimed
    /// again is left alone. Returns whether the row was reset.
    pub async fn release_stale(&self, id: &str, threshold: DateTime<Utc>) -> AppResult<bool> {
        let result = ScheduledPostJob::update_many()
            .col_expr(
                scheduled_post_job::Column::Status,
                Expr::value(JobStatus::Pending),
            )
            .col_expr(scheduled_post_job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(scheduled_post_job::Column::Id.eq(id))
            .filter(scheduled_post_job::Column::Status.eq(JobStatus::InProgress))
            .filter(scheduled_post_job::Column::UpdatedAt.lt(threshold))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    /// Apply a partial update to a job.
    ///
    /// Fails with [`AppError::Conflict`] when no row matched, which covers both
    /// a missing job and a step identifier that was already set.
    pub async fn apply(&self, id: &str, update: JobUpdate) -> AppResult<()> {
        let guarded = update.writes_step_id();
        let mut query = ScheduledPostJob::update_many()
            .col_expr(scheduled_post_job::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(scheduled_post_job::Column::Id.eq(id));

        if let Some(status) = update.status {
            query = query.col_expr(scheduled_post_job::Column::Status, Expr::value(status));
        }
        if let Some(message) = update.last_error {
            query = query.col_expr(scheduled_post_job::Column::LastError, Expr::value(message));
        }
        if let Some(post_id) = update.main_post_id {
            query = query
                .col_expr(scheduled_post_job::Column::MainPostId, Expr::value(post_id))
                .filter(scheduled_post_job::Column::MainPostId.is_null());
        }
        if let Some(post_id) = update.reply1_post_id {
            query = query
                .col_expr(scheduled_post_job::Column::Reply1PostId, Expr::value(post_id))
                .filter(scheduled_post_job::Column::Reply1PostId.is_null());
        }
        if let Some(post_id) = update.reply2_post_id {
            query = query
                .col_expr(scheduled_post_job::Column::Reply2PostId, Expr::value(post_id))
                .filter(scheduled_post_job::Column::Reply2PostId.is_null());
        }

        let result = query
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            let reason = if guarded {
                "job is missing or the step identifier is already recorded"
            } else {
                "job is missing"
            };
            return Err(AppError::Conflict(format!(
                "Scheduled post job {id} was not updated: {reason}"
            )));
        }
        Ok(())
    }

    /// Create a new job.
    pub async fn create(
        &self,
        model: scheduled_post_job::ActiveModel,
    ) -> AppResult<scheduled_post_job::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
