//! Migration to create the action_failures table (terminal action failures).

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActionFailures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActionFailures::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActionFailures::DeliveryId).text().not_null())
                    .col(
                        ColumnDef::new(ActionFailures::RepositoryFullName)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActionFailures::Number).big_integer().not_null())
                    .col(ColumnDef::new(ActionFailures::ActionKind).text().not_null())
                    .col(
                        ColumnDef::new(ActionFailures::Payload)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActionFailures::Error).text().not_null())
                    .col(
                        ColumnDef::new(ActionFailures::AttemptCount)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActionFailures::FailedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_action_failures_failed_at ON action_failures (failed_at DESC)".to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_action_failures_failed_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ActionFailures::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActionFailures {
    Table,
    Id,
    DeliveryId,
    RepositoryFullName,
    Number,
    ActionKind,
    Payload,
    Error,
    AttemptCount,
    FailedAt,
}
