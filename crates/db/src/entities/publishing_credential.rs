//! Publishing credential entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Access token an owner granted for publishing on their behalf.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publishing_credential")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,

    /// The owner's user id on the publishing platform.
    pub platform_user_id: String,

    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub access_token: String,

    /// Null for tokens that do not expire.
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
