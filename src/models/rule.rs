//! Rule entity model
//!
//! Maintainer-configured keyword rules evaluated against incoming events.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::SuggestionType;

/// Keyword rule producing a label or comment suggestion
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "rules")]
pub struct Model {
    /// Rule identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Event type this rule applies to, compared case-insensitively
    pub event_type: String,

    /// Case-insensitive substring searched for in the event text
    pub keyword: String,

    /// `label` or `comment`
    pub suggestion_type: String,

    /// Label name or comment body
    pub suggestion_value: String,

    /// Human-readable explanation copied onto alerts
    pub reason: String,

    /// Only active rules take part in matching
    pub is_active: bool,

    /// Timestamp when the rule was created
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Parsed suggestion type, `None` when the stored value is unrecognised
    pub fn suggestion_kind(&self) -> Option<SuggestionType> {
        self.suggestion_type.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
