//! # ActionAttempt Repository
//!
//! Persists the pending/succeeded/failed lifecycle of each remote action so
//! an attempt abandoned by a crash stays visible as `pending`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::clock::to_storage;
use crate::error::RepositoryError;
use crate::models::AttemptStatus;
use crate::models::action_attempt::{ActiveModel, Column, Entity, Model};

/// Outcomes of attempts that finished inside a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptStats {
    pub succeeded: u64,
    pub failed: u64,
    /// Durations of finished attempts in milliseconds, unsorted
    pub durations_ms: Vec<i64>,
}

impl AttemptStats {
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone)]
pub struct ActionAttemptRepository {
    db: Arc<DatabaseConnection>,
}

impl ActionAttemptRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Writes a `pending` row before the first remote call.
    pub async fn start(
        &self,
        alert_id: Option<Uuid>,
        delivery_id: &str,
        action_kind: &str,
        now: DateTime<Utc>,
    ) -> Result<Model, RepositoryError> {
        let now = to_storage(&now);
        ActiveModel {
            id: Set(Uuid::new_v4()),
            alert_id: Set(alert_id),
            delivery_id: Set(delivery_id.to_string()),
            action_kind: Set(action_kind.to_string()),
            status: Set(AttemptStatus::Pending.as_str().to_string()),
            attempt_count: Set(0),
            last_error: Set(None),
            duration_ms: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    /// Moves a pending row to its terminal state.
    pub async fn finish(
        &self,
        id: Uuid,
        status: AttemptStatus,
        attempt_count: u32,
        last_error: Option<String>,
        duration_ms: i64,
        now: DateTime<Utc>,
    ) -> Result<Model, RepositoryError> {
        let row = Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| RepositoryError::not_found("action attempt", id))?;

        let mut active = row.into_active_model();
        active.status = Set(status.as_str().to_string());
        active.attempt_count = Set(i32::try_from(attempt_count).unwrap_or(i32::MAX));
        active.last_error = Set(last_error);
        active.duration_ms = Set(Some(duration_ms));
        active.updated_at = Set(to_storage(&now));
        active
            .update(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Model>, RepositoryError> {
        Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Attempts that reached a terminal state at or after `since`.
    pub async fn stats_since(&self, since: DateTime<Utc>) -> Result<AttemptStats, RepositoryError> {
        let rows: Vec<(String, Option<i64>)> = Entity::find()
            .select_only()
            .column(Column::Status)
            .column(Column::DurationMs)
            .filter(Column::Status.is_in([
                AttemptStatus::Succeeded.as_str(),
                AttemptStatus::Failed.as_str(),
            ]))
            .filter(Column::UpdatedAt.gte(to_storage(&since)))
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)?;

        let mut stats = AttemptStats::default();
        for (status, duration) in rows {
            if status == AttemptStatus::Succeeded.as_str() {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
            if let Some(ms) = duration {
                stats.durations_ms.push(ms);
            }
        }
        Ok(stats)
    }
}
