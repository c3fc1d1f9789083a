//! # Webhook Handlers
//!
//! Public GitHub webhook endpoint. Authenticity comes from the
//! `X-Hub-Signature-256` HMAC; there is no operator authentication.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::CONTENT_LENGTH},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::intake::{ActionSummary, IntakeOutcome, WebhookDelivery};
use crate::server::AppState;
use crate::webhook_verification::SIGNATURE_HEADER;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

/// Webhook accept response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAcceptResponse {
    /// `accepted` for a new delivery, `duplicate` for a redelivery
    #[schema(example = "accepted")]
    pub status: String,
    pub delivery_id: String,
    pub event_id: Uuid,
    /// Alerts raised by this delivery
    pub alert_ids: Vec<Uuid>,
    /// `inline` or `background`
    pub dispatch: String,
    /// Action outcomes; only populated for inline dispatch
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionSummaryResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActionSummaryResponse {
    pub alert_id: Option<Uuid>,
    #[schema(example = "label")]
    pub action_kind: String,
    #[schema(example = "succeeded")]
    pub status: String,
    pub attempt_count: u32,
    pub error: Option<String>,
}

impl From<ActionSummary> for ActionSummaryResponse {
    fn from(summary: ActionSummary) -> Self {
        Self {
            alert_id: summary.alert_id,
            action_kind: summary.action_kind,
            status: summary.status.as_str().to_string(),
            attempt_count: summary.attempt_count,
            error: summary.error,
        }
    }
}

impl From<IntakeOutcome> for WebhookAcceptResponse {
    fn from(outcome: IntakeOutcome) -> Self {
        Self {
            status: if outcome.is_new { "accepted" } else { "duplicate" }.to_string(),
            delivery_id: outcome.event.delivery_id,
            event_id: outcome.event.id,
            alert_ids: outcome.alert_ids,
            dispatch: outcome.dispatch.as_str().to_string(),
            actions: outcome.actions.into_iter().map(Into::into).collect(),
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Receive a GitHub webhook delivery
#[utoipa::path(
    post,
    path = "/webhooks/github",
    params(
        ("X-Hub-Signature-256" = String, Header, description = "HMAC-SHA256 of the raw body, `sha256=<hex>`"),
        ("X-GitHub-Event" = String, Header, description = "Event type, e.g. issues"),
        ("X-GitHub-Delivery" = String, Header, description = "Unique delivery identifier")
    ),
    request_body(content = JsonValue, description = "Raw GitHub event payload", content_type = "application/json"),
    responses(
        (status = 202, description = "New delivery accepted", body = WebhookAcceptResponse),
        (status = 200, description = "Redelivery of a known delivery id; nothing reprocessed", body = WebhookAcceptResponse),
        (status = 400, description = "Missing headers or malformed payload", body = ApiError),
        (status = 401, description = "Missing or invalid signature", body = ApiError),
        (status = 413, description = "Body exceeds the configured limit", body = ApiError),
        (status = 503, description = "Webhook secret not configured", body = ApiError),
        (status = 500, description = "Event could not be stored", body = ApiError)
    ),
    tag = "webhooks"
)]
pub async fn ingest_github_webhook(
    State(state): State<AppState>,
    req: Request,
) -> Result<(StatusCode, Json<WebhookAcceptResponse>), ApiError> {
    let limit = state.config.webhook_max_body_bytes();
    let headers = req.headers().clone();

    let declared_len = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > limit) {
        return Err(ApiError::payload_too_large(limit));
    }

    let body = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|_| ApiError::payload_too_large(limit))?;

    debug!(
        body_len = body.len(),
        event_type = header_string(&headers, EVENT_HEADER).as_deref().unwrap_or(""),
        "Received GitHub webhook"
    );

    let delivery = WebhookDelivery {
        body: body.to_vec(),
        signature: header_string(&headers, SIGNATURE_HEADER),
        event_type: header_string(&headers, EVENT_HEADER),
        delivery_id: header_string(&headers, DELIVERY_HEADER),
    };

    let outcome = state.intake.handle(delivery).await?;
    let status = if outcome.is_new {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(outcome.into())))
}
