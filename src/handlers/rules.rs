//! # Rules Endpoint Handler
//!
//! Read access to the rule store.

use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::rule;
use crate::repositories::RuleRepository;
use crate::server::AppState;

/// Query parameters for listing rules
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRulesQuery {
    /// Restrict to one event type (case-insensitive)
    pub event_type: Option<String>,
    /// Only rules that take part in matching (default: true when `event_type` is set)
    pub active: Option<bool>,
}

/// Rule information for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleInfo {
    pub id: Uuid,
    #[schema(example = "issues")]
    pub event_type: String,
    #[schema(example = "crash")]
    pub keyword: String,
    #[schema(example = "label")]
    pub suggestion_type: String,
    #[schema(example = "bug")]
    pub suggestion_value: String,
    pub reason: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<rule::Model> for RuleInfo {
    fn from(model: rule::Model) -> Self {
        Self {
            id: model.id,
            event_type: model.event_type,
            keyword: model.keyword,
            suggestion_type: model.suggestion_type,
            suggestion_value: model.suggestion_value,
            reason: model.reason,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RulesResponse {
    pub rules: Vec<RuleInfo>,
}

/// List rules, optionally the active ones for an event type
#[utoipa::path(
    get,
    path = "/rules",
    params(ListRulesQuery),
    responses(
        (status = 200, description = "Rules listed successfully", body = RulesResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "rules"
)]
pub async fn list_rules(
    State(state): State<AppState>,
    Query(query): Query<ListRulesQuery>,
) -> Result<Json<RulesResponse>, ApiError> {
    let repo = RuleRepository::new(state.db.clone());
    let event_type = query
        .event_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let rules = match (event_type, query.active) {
        (Some(event_type), None | Some(true)) => repo.active_for_event_type(event_type).await?,
        (event_type, active) => {
            let rules = repo.list(event_type).await?;
            match active {
                Some(active) => rules
                    .into_iter()
                    .filter(|rule| rule.is_active == active)
                    .collect(),
                None => rules,
            }
        }
    };

    Ok(Json(RulesResponse {
        rules: rules.into_iter().map(RuleInfo::from).collect(),
    }))
}
