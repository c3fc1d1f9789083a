//! # Alerts Endpoint Handler

use std::str::FromStr;

use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::types::PaginatedResponse;
use crate::models::{SuggestionType, alert};
use crate::repositories::{AlertFilter, AlertRepository, Pagination};
use crate::server::AppState;

/// Query parameters for listing alerts
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAlertsQuery {
    pub delivery_id: Option<String>,
    /// Rule UUID
    pub rule_id: Option<String>,
    /// `label` or `comment`
    pub suggestion_type: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Alert information for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertInfo {
    pub id: Uuid,
    pub delivery_id: String,
    pub rule_id: Uuid,
    pub event_type: String,
    pub action: String,
    #[schema(example = "label")]
    pub suggestion_type: String,
    pub suggestion_value: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<alert::Model> for AlertInfo {
    fn from(model: alert::Model) -> Self {
        Self {
            id: model.id,
            delivery_id: model.delivery_id,
            rule_id: model.rule_id,
            event_type: model.event_type,
            action: model.action,
            suggestion_type: model.suggestion_type,
            suggestion_value: model.suggestion_value,
            reason: model.reason,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// List alerts, newest first
#[utoipa::path(
    get,
    path = "/alerts",
    params(ListAlertsQuery),
    responses(
        (status = 200, description = "Alerts listed successfully", body = PaginatedResponse<AlertInfo>),
        (status = 400, description = "Invalid query parameters", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "rule_id must be a valid UUID"
        })),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<ListAlertsQuery>,
) -> Result<Json<PaginatedResponse<AlertInfo>>, ApiError> {
    let rule_id = query
        .rule_id
        .as_deref()
        .map(Uuid::from_str)
        .transpose()
        .map_err(|_| ApiError::bad_request("rule_id must be a valid UUID"))?;

    let suggestion_type = query
        .suggestion_type
        .as_deref()
        .map(SuggestionType::from_str)
        .transpose()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let filter = AlertFilter {
        delivery_id: query.delivery_id,
        rule_id,
        suggestion_type,
    };
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };

    let alerts = AlertRepository::new(state.db.clone())
        .list(&filter, page)
        .await?;

    Ok(Json(PaginatedResponse::new(
        alerts.into_iter().map(AlertInfo::from).collect(),
        page,
    )))
}
