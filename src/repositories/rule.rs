//! Rule repository for database operations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::clock::to_storage;
use crate::error::RepositoryError;
use crate::models::SuggestionType;
use crate::models::rule::{ActiveModel, Column, Entity, Model};

/// Fields for a new rule
#[derive(Debug, Clone)]
pub struct NewRule {
    pub event_type: String,
    pub keyword: String,
    pub suggestion_type: SuggestionType,
    pub suggestion_value: String,
    pub reason: String,
    pub is_active: bool,
}

/// Repository for rule database operations
#[derive(Debug, Clone)]
pub struct RuleRepository {
    db: Arc<DatabaseConnection>,
}

impl RuleRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        rule: NewRule,
        created_at: DateTime<Utc>,
    ) -> Result<Model, RepositoryError> {
        ActiveModel {
            id: Set(Uuid::new_v4()),
            event_type: Set(rule.event_type.trim().to_string()),
            keyword: Set(rule.keyword),
            suggestion_type: Set(rule.suggestion_type.as_str().to_string()),
            suggestion_value: Set(rule.suggestion_value),
            reason: Set(rule.reason),
            is_active: Set(rule.is_active),
            created_at: Set(to_storage(&created_at)),
        }
        .insert(&*self.db)
        .await
        .map_err(RepositoryError::database_error)
    }

    /// Activates or deactivates a rule. Takes effect on the next evaluation.
    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Model, RepositoryError> {
        let rule = Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(|| RepositoryError::not_found("rule", id))?;

        let mut active = rule.into_active_model();
        active.is_active = Set(is_active);
        active
            .update(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// Active rules whose event type equals `event_type`, ignoring case.
    pub async fn active_for_event_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<Model>, RepositoryError> {
        Entity::find()
            .filter(Column::IsActive.eq(true))
            .filter(
                Expr::expr(Func::lower(Expr::col((Entity, Column::EventType))))
                    .eq(event_type.trim().to_lowercase()),
            )
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }

    /// All rules, oldest first, optionally restricted to one event type.
    pub async fn list(&self, event_type: Option<&str>) -> Result<Vec<Model>, RepositoryError> {
        let mut query = Entity::find();
        if let Some(event_type) = event_type {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col((Entity, Column::EventType))))
                    .eq(event_type.trim().to_lowercase()),
            );
        }

        query
            .order_by_asc(Column::CreatedAt)
            .order_by_asc(Column::Id)
            .all(&*self.db)
            .await
            .map_err(RepositoryError::database_error)
    }
}
