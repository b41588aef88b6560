//! Create `publishing_credential` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PublishingCredential::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PublishingCredential::OwnerId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PublishingCredential::PlatformUserId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PublishingCredential::AccessToken)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PublishingCredential::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(PublishingCredential::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PublishingCredential::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PublishingCredential::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PublishingCredential {
    Table,
    OwnerId,
    PlatformUserId,
    AccessToken,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
