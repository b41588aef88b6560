//! Create `scheduled_post_job` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ScheduledPostJob::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduledPostJob::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ScheduledPostJob::OwnerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledPostJob::ScheduledTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduledPostJob::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(ScheduledPostJob::MainText).text().not_null())
                    .col(ColumnDef::new(ScheduledPostJob::Reply1Text).text())
                    .col(ColumnDef::new(ScheduledPostJob::Reply2Text).text())
                    .col(ColumnDef::new(ScheduledPostJob::MainPostId).string_len(64))
                    .col(ColumnDef::new(ScheduledPostJob::Reply1PostId).string_len(64))
                    .col(ColumnDef::new(ScheduledPostJob::Reply2PostId).string_len(64))
                    .col(ColumnDef::new(ScheduledPostJob::LastError).text())
                    .col(
                        ColumnDef::new(ScheduledPostJob::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ScheduledPostJob::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index on owner_id for listing an account's jobs
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_post_job_owner_id")
                    .table(ScheduledPostJob::Table)
                    .col(ScheduledPostJob::OwnerId)
                    .to_owned(),
            )
            .await?;

        // Composite index for finding due pending jobs
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_post_job_status_scheduled_time")
                    .table(ScheduledPostJob::Table)
                    .col(ScheduledPostJob::Status)
                    .col(ScheduledPostJob::ScheduledTime)
                    .to_owned(),
            )
            .await?;

        // Composite index for finding stale in-progress jobs
        manager
            .create_index(
                Index::create()
                    .name("idx_scheduled_post_job_status_updated_at")
                    .table(ScheduledPostJob::Table)
                    .col(ScheduledPostJob::Status)
                    .col(ScheduledPostJob::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScheduledPostJob::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ScheduledPostJob {
    Table,
    Id,
    OwnerId,
    ScheduledTime,
    Status,
    MainText,
    Reply1Text,
    Reply2Text,
    MainPostId,
    Reply1PostId,
    Reply2PostId,
    LastError,
    CreatedAt,
    UpdatedAt,
}
