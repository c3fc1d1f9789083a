//! Migration to create the alerts table.
//!
//! `delivery_id` intentionally has no foreign key: alerts and events live in
//! independent stores and partial progress between them is expected.

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
                    .table(Alerts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Alerts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Alerts::DeliveryId).text().not_null())
                    .col(ColumnDef::new(Alerts::RuleId).uuid().not_null())
                    .col(ColumnDef::new(Alerts::EventType).text().not_null())
                    .col(ColumnDef::new(Alerts::Action).text().not_null())
                    .col(ColumnDef::new(Alerts::SuggestionType).text().not_null())
                    .col(ColumnDef::new(Alerts::SuggestionValue).text().not_null())
                    .col(ColumnDef::new(Alerts::Reason).text().not_null())
                    .col(
                        ColumnDef::new(Alerts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_alerts_delivery_id")
                    .table(Alerts::Table)
                    .col(Alerts::DeliveryId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_alerts_created_at ON alerts (created_at DESC)"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_alerts_created_at").to_owned())
            .await?;

        manager
            .drop_index(Index::drop().name("idx_alerts_delivery_id").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Alerts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Alerts {
    Table,
    Id,
    DeliveryId,
    RuleId,
    EventType,
    Action,
    SuggestionType,
    SuggestionValue,
    Reason,
    CreatedAt,
}
