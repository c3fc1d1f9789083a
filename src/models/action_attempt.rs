//! ActionAttempt entity model
//!
//! Persisted state of one remote action: written as `pending` before the first
//! try and finalised as `succeeded` or `failed`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "action_attempts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Alert being acted on; `None` when the alert row could not be stored
    pub alert_id: Option<Uuid>,

    pub delivery_id: String,

    /// `label` or `comment`
    pub action_kind: String,

    /// `pending`, `succeeded` or `failed`
    pub status: String,

    /// Remote calls made so far
    pub attempt_count: i32,

    pub last_error: Option<String>,

    /// Wall time from first try to final outcome
    pub duration_ms: Option<i64>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
