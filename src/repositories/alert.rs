//! # Alert Repository
//!
//! Append-only store of rule hits. One row per (delivery, matching rule).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::Pagination;
use crate::clock::to_storage;
use crate::error::RepositoryError;
use crate::models::SuggestionType;
use crate::models::alert::{ActiveModel, Column, Entity, Model};

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub delivery_id: String,
    pub rule_id: Uuid,
    pub event_type: String,
    pub action: String,
    pub suggestion_type: SuggestionType,
    pub suggestion_value: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Equality filters for listing alerts
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub delivery_id: Option<String>,
    pub rule_id: Option<Uuid>,
    pub suggestion_type: Option<SuggestionType>,
}

#[derive(Debug, Clone)]
pub struct AlertRepository {
    db: Arc<DatabaseConnection>,
}

impl AlertRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Always inserts; callers guarantee one call per suggestion.
    pub async fn record_alert(&self, alert: NewAlert) -> Result<Model, RepositoryError> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(alert.delivery_id),
            rule_id: Set(alert.rule_id),
            event_type: Set(alert.event_type),
            action: Set(alert.action),
            suggestion_type: Set(alert.suggestion_type.as_str().to_string()),
            suggestion_value: Set(alert.suggestion_value),
            reason: Set(alert.reason),
            created_at: Set(to_storage(&alert.created_at)),
        }
        .insert(&*self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Entity::find()
            .filter(Column::CreatedAt.gte(to_storage(&since)))
            .count(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn list_for_delivery(&self, delivery_id: &str) -> Result<Vec<Model>, RepositoryError> {
        self.list(
            &AlertFilter {
                delivery_id: Some(delivery_id.to_string()),
                ..AlertFilter::default()
            },
            Pagination::new(super::MAX_PAGE_LIMIT, 0),
        )
        .await
    }

    /// Newest first.
    pub async fn list(
        &self,
        filter: &AlertFilter,
        page: Pagination,
    ) -> Result<Vec<Model>, RepositoryError> {
        let mut query = Entity::find();

        if let Some(delivery_id) = &filter.delivery_id {
            query = query.filter(Column::DeliveryId.eq(delivery_id.as_str()));
        }
        if let Some(rule_id) = filter.rule_id {
            query = query.filter(Column::RuleId.eq(rule_id));
        }
        if let Some(kind) = filter.suggestion_type {
            query = query.filter(Column::SuggestionType.eq(kind.as_str()));
        }

        query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
