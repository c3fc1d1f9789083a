//! # Action Failures Endpoint Handler
//!
//! Terminal action failures, kept for manual follow-up.

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
use crate::models::action_failure;
use crate::repositories::{ActionFailureRepository, FailureFilter, Pagination};
use crate::server::AppState;

/// Query parameters for listing failures
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFailuresQuery {
    pub delivery_id: Option<String>,
    /// Filter by `owner/name`
    pub repository: Option<String>,
    /// `label` or `comment`
    pub action_kind: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Failure information for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailureInfo {
    pub id: Uuid,
    pub delivery_id: String,
    pub repository_full_name: String,
    pub number: i64,
    #[schema(example = "comment")]
    pub action_kind: String,
    /// Request body that was sent
    pub payload: serde_json::Value,
    pub error: String,
    pub attempt_count: i32,
    pub failed_at: DateTime<Utc>,
}

impl From<action_failure::Model> for FailureInfo {
    fn from(model: action_failure::Model) -> Self {
        Self {
            id: model.id,
            delivery_id: model.delivery_id,
            repository_full_name: model.repository_full_name,
            number: model.number,
            action_kind: model.action_kind,
            payload: model.payload,
            error: model.error,
            attempt_count: model.attempt_count,
            failed_at: model.failed_at.with_timezone(&Utc),
        }
    }
}

/// List action failures, newest first
#[utoipa::path(
    get,
    path = "/failures",
    params(ListFailuresQuery),
    responses(
        (status = 200, description = "Failures listed successfully", body = PaginatedResponse<FailureInfo>),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "failures"
)]
pub async fn list_failures(
    State(state): State<AppState>,
    Query(query): Query<ListFailuresQuery>,
) -> Result<Json<PaginatedResponse<FailureInfo>>, ApiError> {
    let filter = FailureFilter {
        delivery_id: query.delivery_id,
        repository_full_name: query.repository,
        action_kind: query.action_kind.map(|kind| kind.trim().to_ascii_lowercase()),
    };
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };

    let failures = ActionFailureRepository::new(state.db.clone())
        .list(&filter, page)
        .await?;

    Ok(Json(PaginatedResponse::new(
        failures.into_iter().map(FailureInfo::from).collect(),
        page,
    )))
}
