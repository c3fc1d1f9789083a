//! # Events Endpoint Handler
//!
//! Lists stored webhook deliveries, newest first.

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
use crate::models::webhook_event;
use crate::repositories::{EventFilter, Pagination, WebhookEventRepository};
use crate::server::AppState;

/// Query parameters for listing events
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEventsQuery {
    /// Filter by event type, e.g. `issues`
    pub event_type: Option<String>,
    /// Filter by `owner/name`
    pub repository: Option<String>,
    /// Filter by payload action, e.g. `opened`
    pub action: Option<String>,
    /// Maximum rows to return (default 50, max 200)
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Include the raw payload (default: false)
    pub include_payload: Option<bool>,
}

/// Stored delivery for API responses
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventInfo {
    pub id: Uuid,
    pub delivery_id: String,
    #[schema(example = "issues")]
    pub event_type: String,
    #[schema(example = "opened")]
    pub action: String,
    #[schema(example = "octo/widgets")]
    pub repository_full_name: String,
    pub sender_login: String,
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl EventInfo {
    fn from_model(model: webhook_event::Model, include_payload: bool) -> Self {
        Self {
            id: model.id,
            delivery_id: model.delivery_id,
            event_type: model.event_type,
            action: model.action,
            repository_full_name: model.repository_full_name,
            sender_login: model.sender_login,
            received_at: model.received_at.with_timezone(&Utc),
            payload: include_payload.then_some(model.payload),
        }
    }
}

/// List stored webhook events
#[utoipa::path(
    get,
    path = "/events",
    params(ListEventsQuery),
    responses(
        (status = 200, description = "Events listed successfully", body = PaginatedResponse<EventInfo>),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "events"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<PaginatedResponse<EventInfo>>, ApiError> {
    let filter = EventFilter {
        event_type: query.event_type,
        repository_full_name: query.repository,
        action: query.action,
    };
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let include_payload = query.include_payload.unwrap_or(false);

    let events = WebhookEventRepository::new(state.db.clone())
        .list(&filter, page)
        .await?;

    Ok(Json(PaginatedResponse::new(
        events
            .into_iter()
            .map(|event| EventInfo::from_model(event, include_payload))
            .collect(),
        page,
    )))
}
