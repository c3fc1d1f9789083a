//! # Metrics Overview Handler

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::aggregator::{MetricsWindow, Overview};
use crate::error::ApiError;
use crate::server::AppState;

/// Query parameters for the overview endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OverviewQuery {
    /// Look-back window: `6h`, `12h` or `24h` (default `24h`)
    #[param(example = "24h")]
    pub window: Option<String>,
}

/// Counts and action health over a rolling window
#[utoipa::path(
    get,
    path = "/metrics/overview",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Windowed aggregate", body = Overview),
        (status = 400, description = "Unsupported window", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "unsupported window '48h'; expected one of 6h, 12h, 24h"
        })),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "metrics"
)]
pub async fn metrics_overview(
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<Overview>, ApiError> {
    let window = match query.window.as_deref() {
        Some(raw) => raw
            .parse::<MetricsWindow>()
            .map_err(|err| {
                let allowed: Vec<&str> = MetricsWindow::ALL.iter().map(|w| w.as_str()).collect();
                ApiError::bad_request(err.to_string())
                    .with_details(json!({ "window": raw, "allowed": allowed }))
            })?,
        None => MetricsWindow::default(),
    };

    let overview = state.aggregator.overview(window).await?;
    Ok(Json(overview))
}
