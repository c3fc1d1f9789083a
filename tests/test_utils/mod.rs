//! Test utilities shared by the integration tests.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{DateTime, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use tower::ServiceExt;
use triage::models::SuggestionType;
use triage::repositories::{NewRule, RuleRepository};
use triage::webhook_verification::sign_github_payload;

pub const WEBHOOK_SECRET: &str = "integration-secret";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

pub fn base_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

#[allow(dead_code)]
pub async fn insert_rule(
    db: &Arc<DatabaseConnection>,
    keyword: &str,
    suggestion_type: SuggestionType,
    suggestion_value: &str,
) -> Result<()> {
    RuleRepository::new(db.clone())
        .create(
            NewRule {
                event_type: "issues".to_string(),
                keyword: keyword.to_string(),
                suggestion_type,
                suggestion_value: suggestion_value.to_string(),
                reason: format!("mentions {keyword}"),
                is_active: true,
            },
            base_instant(),
        )
        .await?;
    Ok(())
}

#[allow(dead_code)]
pub fn issue_payload(number: i64, title: &str) -> Value {
    json!({
        "action": "opened",
        "issue": {"number": number, "title": title, "body": "Steps to reproduce attached"},
        "repository": {"full_name": "octo/widgets"},
        "sender": {"login": "octocat"},
    })
}

/// Signed `POST /webhooks/github` request for an `issues` event.
#[allow(dead_code)]
pub fn signed_delivery(delivery_id: &str, payload: &Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = sign_github_payload(&body, WEBHOOK_SECRET).unwrap();
    Request::builder()
        .method("POST")
        .uri("/webhooks/github")
        .header("content-type", "application/json")
        .header("X-GitHub-Event", "issues")
        .header("X-GitHub-Delivery", delivery_id)
        .header("X-Hub-Signature-256", signature)
        .body(Body::from(body))
        .unwrap()
}

#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[allow(dead_code)]
pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}
