//! End-to-end intake: signed delivery through the router to a mocked
//! GitHub issues API.

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::StatusCode};
use sea_orm::DatabaseConnection;
use serde_json::json;
use triage::actions::{GitHubActionExecutor, GitHubExecutorConfig};
use triage::clock::FixedClock;
use triage::config::{ActionRetryConfig, AppConfig, DispatchMode};
use triage::models::SuggestionType;
use triage::repositories::{
    ActionFailureRepository, AlertFilter, AlertRepository, FailureFilter, Pagination,
    WebhookEventRepository,
};
use triage::server::{AppState, create_app};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

mod test_utils;
use test_utils::{
    WEBHOOK_SECRET, base_instant, get, insert_rule, issue_payload, send, setup_test_db,
    signed_delivery,
};

fn app(db: Arc<DatabaseConnection>, github: &MockServer) -> Router {
    let config = AppConfig {
        profile: "test".to_string(),
        webhook_github_secret: Some(WEBHOOK_SECRET.to_string()),
        github_api_base: github.uri(),
        github_token: Some("ghp_integration".to_string()),
        action_retry: ActionRetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 1,
            jitter_factor: 0.0,
            retry_comments: true,
        },
        action_dispatch: DispatchMode::Inline,
        ..AppConfig::default()
    };
    let executor = GitHubActionExecutor::new(GitHubExecutorConfig {
        api_base: github.uri(),
        token: config.github_token.clone(),
        request_timeout: Duration::from_secs(2),
    });

    create_app(AppState::new(
        config,
        db,
        Arc::new(FixedClock::new(base_instant())),
        Arc::new(executor),
    ))
}

#[tokio::test]
async fn test_matching_rules_label_and_comment_the_issue() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues/42/labels"))
        .and(header("authorization", "Bearer ghp_integration"))
        .and(body_json(json!({"labels": ["bug"]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&github)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues/42/comments"))
        .and(body_json(json!({"body": "Thanks, a maintainer will look soon."})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&github)
        .await;

    let db = setup_test_db().await.unwrap();
    insert_rule(&db, "crash", SuggestionType::Label, "bug").await.unwrap();
    insert_rule(
        &db,
        "Crash",
        SuggestionType::Comment,
        "Thanks, a maintainer will look soon.",
    )
    .await
    .unwrap();
    insert_rule(&db, "typo", SuggestionType::Label, "docs").await.unwrap();
    let router = app(db.clone(), &github);

    let (status, body) = send(
        &router,
        signed_delivery("e2e-1", &issue_payload(42, "CRASH when saving")),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["alert_ids"].as_array().unwrap().len(), 2);
    let actions = body["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 2);
    assert!(actions.iter().all(|a| a["status"] == "succeeded"));

    let alerts = AlertRepository::new(db.clone())
        .list_for_delivery("e2e-1")
        .await
        .unwrap();
    assert_eq!(alerts.len(), 2);
    assert_ne!(alerts[0].rule_id, alerts[1].rule_id);
    assert!(
        ActionFailureRepository::new(db)
            .list(&FailureFilter::default(), Pagination::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_persistent_remote_errors_record_one_failure() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues/7/labels"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(3)
        .mount(&github)
        .await;

    let db = setup_test_db().await.unwrap();
    insert_rule(&db, "crash", SuggestionType::Label, "bug").await.unwrap();
    let router = app(db.clone(), &github);

    let (status, body) = send(
        &router,
        signed_delivery("e2e-fail", &issue_payload(7, "crash on start")),
    )
    .await;

    // The delivery itself is accepted; the action failure is bookkept.
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["actions"][0]["status"], "failed");
    assert_eq!(body["actions"][0]["attempt_count"], 3);

    let failures = ActionFailureRepository::new(db.clone())
        .list(&FailureFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    let failure = &failures[0];
    assert_eq!(failure.delivery_id, "e2e-fail");
    assert_eq!(failure.repository_full_name, "octo/widgets");
    assert_eq!(failure.number, 7);
    assert_eq!(failure.action_kind, "label");
    assert_eq!(failure.attempt_count, 3);
    assert_eq!(failure.payload, json!({"labels": ["bug"]}));
    assert!(failure.error.contains("500"));

    let (_, listed) = get(&router, "/failures?repository=octo/widgets").await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let (_, overview) = get(&router, "/metrics/overview?window=6h").await;
    assert_eq!(overview["failures"], 1);
    assert_eq!(overview["success_rate"], 0.0);
}

#[tokio::test]
async fn test_redelivery_creates_no_new_rows_or_calls() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&github)
        .await;

    let db = setup_test_db().await.unwrap();
    insert_rule(&db, "crash", SuggestionType::Label, "bug").await.unwrap();
    let router = app(db.clone(), &github);
    let payload = issue_payload(42, "crash");

    let (first, _) = send(&router, signed_delivery("e2e-dup", &payload)).await;
    let (second, body) = send(&router, signed_delivery("e2e-dup", &payload)).await;

    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");
    assert_eq!(WebhookEventRepository::new(db.clone()).count().await.unwrap(), 1);
    assert_eq!(
        AlertRepository::new(db)
            .list(&AlertFilter::default(), Pagination::default())
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_tampered_body_is_rejected_without_side_effects() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&github)
        .await;

    let db = setup_test_db().await.unwrap();
    insert_rule(&db, "crash", SuggestionType::Label, "bug").await.unwrap();
    let router = app(db.clone(), &github);

    let mut request = signed_delivery("e2e-tampered", &issue_payload(42, "crash"));
    *request.body_mut() = axum::body::Body::from(
        serde_json::to_vec(&issue_payload(43, "crash")).unwrap(),
    );

    let (status, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SIGNATURE");
    assert_eq!(WebhookEventRepository::new(db.clone()).count().await.unwrap(), 0);
    assert!(
        AlertRepository::new(db)
            .list(&AlertFilter::default(), Pagination::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_event_without_issue_number_fails_validation_without_calls() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&github)
        .await;

    let db = setup_test_db().await.unwrap();
    insert_rule(&db, "crash", SuggestionType::Label, "bug").await.unwrap();
    let router = app(db.clone(), &github);

    let payload = json!({
        "action": "opened",
        "issue": {"title": "crash"},
        "repository": {"full_name": "octo/widgets"},
    });
    let (status, body) = send(&router, signed_delivery("e2e-nonumber", &payload)).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["actions"][0]["status"], "failed");
    assert_eq!(body["actions"][0]["attempt_count"], 0);
    assert!(
        ActionFailureRepository::new(db)
            .list(&FailureFilter::default(), Pagination::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_urgent_issue_gets_priority_label() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/octo/widgets/issues/101/labels"))
        .and(body_json(json!({"labels": ["priority-high"]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&github)
        .await;

    let db = setup_test_db().await.unwrap();
    insert_rule(&db, "urgent", SuggestionType::Label, "priority-high")
        .await
        .unwrap();
    let router = app(db.clone(), &github);

    let (status, _) = send(
        &router,
        signed_delivery("e2e-urgent", &issue_payload(101, "Urgent: login broken")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, events) = get(&router, "/events?event_type=issues&action=opened").await;
    assert_eq!(events["data"].as_array().unwrap().len(), 1);
    assert_eq!(events["data"][0]["repository_full_name"], "octo/widgets");

    let alerts = AlertRepository::new(db).list_for_delivery("e2e-urgent").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].suggestion_value, "priority-high");
}
