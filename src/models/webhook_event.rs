//! WebhookEvent entity model
//!
//! This module contains the SeaORM entity model for the webhook_events table,
//! the append-only audit trail of every unique delivery received.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One received webhook delivery
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "webhook_events")]
pub struct Model {
    /// Row identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Source-assigned delivery identifier (unique)
    #[sea_orm(unique)]
    pub delivery_id: String,

    /// Event type from the delivery headers (e.g., issues, pull_request)
    pub event_type: String,

    /// Payload `action` field (e.g., opened); empty when absent
    pub action: String,

    /// `owner/name` of the repository, or `unknown`
    pub repository_full_name: String,

    /// Login of the user that triggered the event, or `unknown`
    pub sender_login: String,

    /// Raw JSON payload as delivered
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,

    /// Instant the delivery was accepted, always written in UTC
    pub received_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
