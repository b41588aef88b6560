//! Scheduled post job entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a scheduled post job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its scheduled time (or reclaimed after a crash).
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Claimed by a worker invocation.
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    /// Every applicable step has been published.
    #[sea_orm(string_value = "posted")]
    Posted,
    /// A step failed terminally.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// A thread (main post plus up to two replies) scheduled for publishing.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scheduled_post_job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Account whose publishing credential is used.
    #[sea_orm(indexed)]
    pub owner_id: String,

    /// Instant at which the job becomes eligible.
    #[sea_orm(indexed)]
    pub scheduled_time: DateTimeWithTimeZone,

    /// Current status.
    pub status: JobStatus,

    /// Text of the primary post.
    #[sea_orm(column_type = "Text")]
    pub main_text: String,

    /// Text of the first reply; empty or missing means no reply.
    #[sea_orm(column_type = "Text", nullable)]
    pub reply1_text: Option<String>,

    /// Text of the second reply; empty or missing means no reply.
    #[sea_orm(column_type = "Text", nullable)]
    pub reply2_text: Option<String>,

    /// External id of the published primary post.
    #[sea_orm(nullable)]
    pub main_post_id: Option<String>,

    /// External id of the published first reply.
    #[sea_orm(nullable)]
    pub reply1_post_id: Option<String>,

    /// External id of the published second reply.
    #[sea_orm(nullable)]
    pub reply2_post_id: Option<String>,

    /// Message of the last terminal failure.
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    /// Bumped on every mutation; basis for staleness detection.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
