//! # WebhookEvent Repository
//!
//! Idempotent persistence of received deliveries. The unique index on
//! `delivery_id` decides which of two racing redeliveries wins; no
//! application-level lock is taken.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use super::Pagination;
use crate::clock::to_storage;
use crate::error::{RepositoryError, is_unique_violation};
use crate::models::webhook_event::{ActiveModel, Column, Entity, Model};

/// Fields of a delivery about to be recorded.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub delivery_id: String,
    pub event_type: String,
    pub action: String,
    pub repository_full_name: String,
    pub sender_login: String,
    pub payload: JsonValue,
    pub received_at: DateTime<Utc>,
}

/// Equality filters for listing events
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub repository_full_name: Option<String>,
    pub action: Option<String>,
}

/// Repository for webhook event database operations
#[derive(Debug, Clone)]
pub struct WebhookEventRepository {
    db: Arc<DatabaseConnection>,
}

impl WebhookEventRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts the event unless its delivery id is already stored.
    ///
    /// Returns the stored row and `true` when this call created it, or the
    /// pre-existing row and `false` for a redelivery.
    pub async fn record_event(
        &self,
        event: NewWebhookEvent,
    ) -> Result<(Model, bool), RepositoryError> {
        let delivery_id = event.delivery_id.clone();

        let row = ActiveModel {
            id: Set(Uuid::new_v4()),
            delivery_id: Set(event.delivery_id),
            event_type: Set(event.event_type),
            action: Set(event.action),
            repository_full_name: Set(event.repository_full_name),
            sender_login: Set(event.sender_login),
            payload: Set(event.payload),
            received_at: Set(to_storage(&event.received_at)),
        };

        let inserted = Entity::insert(row)
            .on_conflict(
                OnConflict::column(Column::DeliveryId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await;

        let is_new = match inserted {
            Ok(rows) => rows > 0,
            Err(err) if is_unique_violation(&err) => false,
            Err(err) => return Err(RepositoryError::database_error(err)),
        };

        if !is_new {
            debug!(delivery_id = %delivery_id, "Delivery already recorded");
        }

        let stored = self
            .find_by_delivery_id(&delivery_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("webhook event", &delivery_id))?;

        Ok((stored, is_new))
    }

    pub async fn find_by_delivery_id(
        &self,
        delivery_id: &str,
    ) -> Result<Option<Model>, RepositoryError> {
        Entity::find()
            .filter(Column::DeliveryId.eq(delivery_id))
            .one(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Events received at or after `since`.
    pub async fn count_since(&self, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        Entity::find()
            .filter(Column::ReceivedAt.gte(to_storage(&since)))
            .count(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Newest first.
    pub async fn list(
        &self,
        filter: &EventFilter,
        page: Pagination,
    ) -> Result<Vec<Model>, RepositoryError> {
        let mut query = Entity::find();

        if let Some(event_type) = &filter.event_type {
            query = query.filter(Column::EventType.eq(event_type.as_str()));
        }
        if let Some(repository) = &filter.repository_full_name {
            query = query.filter(Column::RepositoryFullName.eq(repository.as_str()));
        }
        if let Some(action) = &filter.action {
            query = query.filter(Column::Action.eq(action.as_str()));
        }

        query
            .order_by_desc(Column::ReceivedAt)
            .order_by_desc(Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    pub async fn count(&self) -> Result<u64, RepositoryError> {
        Entity::find()
            .count(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
