//! Database migrations for the triage service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_09_01_000001_create_webhook_events;
mod m2026_09_01_000002_create_rules;
mod m2026_09_01_000003_create_alerts;
mod m2026_09_01_000004_create_action_failures;
mod m2026_09_20_000001_create_action_attempts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_09_01_000001_create_webhook_events::Migration),
            Box::new(m2026_09_01_000002_create_rules::Migration),
            Box::new(m2026_09_01_000003_create_alerts::Migration),
            Box::new(m2026_09_01_000004_create_action_failures::Migration),
            Box::new(m2026_09_20_000001_create_action_attempts::Migration),
        ]
    }
}
