//! ActionFailure entity model
//!
//! Written once per remote action that exhausted its retry budget.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Terminal failure of a label/comment action
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "action_failures")]
pub struct Model {
    /// Unique identifier for the failure (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Delivery whose alert triggered the action
    pub delivery_id: String,

    /// Target repository (`owner/name`)
    pub repository_full_name: String,

    /// Issue or pull request number
    pub number: i64,

    /// `label` or `comment`
    pub action_kind: String,

    /// Request body that was sent to the remote API
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,

    /// Error from the final attempt
    pub error: String,

    /// Number of attempts made before giving up
    pub attempt_count: i32,

    /// Timestamp when the action was declared failed
    pub failed_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
