//! Migration to create the rules table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rules::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rules::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rules::EventType).text().not_null())
                    .col(ColumnDef::new(Rules::Keyword).text().not_null())
                    .col(ColumnDef::new(Rules::SuggestionType).text().not_null())
                    .col(ColumnDef::new(Rules::SuggestionValue).text().not_null())
                    .col(ColumnDef::new(Rules::Reason).text().not_null())
                    .col(
                        ColumnDef::new(Rules::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Rules::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_rules_event_type_active")
                    .table(Rules::Table)
                    .col(Rules::EventType)
                    .col(Rules::IsActive)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_rules_event_type_active").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Rules::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rules {
    Table,
    Id,
    EventType,
    Keyword,
    SuggestionType,
    SuggestionValue,
    Reason,
    IsActive,
    CreatedAt,
}
