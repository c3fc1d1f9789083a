//! Migration to create the action_attempts table.
//!
//! Each row tracks one remote action from `pending` to `succeeded` or
//! `failed`, so success rate and latency can be derived per window.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActionAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActionAttempts::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActionAttempts::AlertId).uuid().null())
                    .col(ColumnDef::new(ActionAttempts::DeliveryId).text().not_null())
                    .col(ColumnDef::new(ActionAttempts::ActionKind).text().not_null())
                    .col(
                        ColumnDef::new(ActionAttempts::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(ActionAttempts::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ActionAttempts::LastError).text().null())
                    .col(ColumnDef::new(ActionAttempts::DurationMs).big_integer().null())
                    .col(
                        ColumnDef::new(ActionAttempts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActionAttempts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_action_attempts_status_created")
                    .table(ActionAttempts::Table)
                    .col(ActionAttempts::Status)
                    .col(ActionAttempts::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_action_attempts_status_created")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ActionAttempts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ActionAttempts {
    Table,
    Id,
    AlertId,
    DeliveryId,
    ActionKind,
    Status,
    AttemptCount,
    LastError,
    DurationMs,
    CreatedAt,
    UpdatedAt,
}
