//! # ActionFailure Repository
//!
//! Terminal failures: one row per action that exhausted its retry budget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::Pagination;
use crate::clock::to_storage;
use crate::error::RepositoryError;
use crate::models::action_failure::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone)]
pub struct NewActionFailure {
    pub delivery_id: String,
    pub repository_full_name: String,
    pub number: i64,
    pub action_kind: String,
    pub payload: JsonValue,
    pub error: String,
    pub attempt_count: i32,
    pub failed_at: DateTime<Utc>,
}

/// Equality filters for listing failures
#[derive(Debug, Clone, Default)]
pub struct FailureFilter {
    pub delivery_id: Option<String>,
    pub repository_full_name: Option<String>,
    pub action_kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ActionFailureRepository {
    db: Arc<DatabaseConnection>,
}

impl ActionFailureRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn record(&self, failure: NewActionFailure) -> Result<Model, RepositoryError> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(failure.delivery_id),
            repository_full_name: Set(failure.repository_full_name),
            number: Set(failure.number),
            action_kind: Set(failure.action_kind),
            payload: Set(failure.payload),
            error: Set(failure.error),
            attempt_count: Set(failure.attempt_count),
            failed_at: Set(to_storage(&failure.failed_at)),
        }
        .insert(&*self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Entity::find()
            .filter(Column::FailedAt.gte(to_storage(&since)))
            .count(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Newest first.
    pub async fn list(
        &self,
        filter: &FailureFilter,
        page: Pagination,
    ) -> Result<Vec<Model>, RepositoryError> {
        let mut query = Entity::find();

        if let Some(delivery_id) = &filter.delivery_id {
            query = query.filter(Column::DeliveryId.eq(delivery_id.as_str()));
        }
        if let Some(repository) = &filter.repository_full_name {
            query = query.filter(Column::RepositoryFullName.eq(repository.as_str()));
        }
        if let Some(kind) = &filter.action_kind {
            query = query.filter(Column::ActionKind.eq(kind.as_str()));
        }

        query
            .order_by_desc(Column::FailedAt)
            .order_by_desc(Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{base_instant, setup_test_db};
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_filter_failures() {
        let repo = ActionFailureRepository::new(setup_test_db().await);
        for (delivery, kind) in [("d-1", "label"), ("d-2", "comment")] {
            repo.record(NewActionFailure {
                delivery_id: delivery.to_string(),
                repository_full_name: "octo/widgets".to_string(),
                number: 7,
                action_kind: kind.to_string(),
                payload: json!({"labels": ["priority-high"]}),
                error: "remote returned 500".to_string(),
                attempt_count: 3,
                failed_at: base_instant(),
            })
            .await
            .unwrap();
        }

        let labels = repo
            .list(
                &FailureFilter {
                    action_kind: Some("label".to_string()),
                    ..FailureFilter::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();

        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].delivery_id, "d-1");
        assert_eq!(labels[0].attempt_count, 3);
        assert_eq!(repo.count_since(base_instant()).await.unwrap(), 2);
    }
}
