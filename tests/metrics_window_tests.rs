//! Windowed overview counts under writer/reader clocks with different
//! UTC offsets.

use std::sync::Arc;

use chrono::{Duration, FixedOffset};
use serde_json::json;
use triage::aggregator::{MetricsAggregator, MetricsWindow};
use triage::clock::{Clock, FixedClock};
use triage::models::SuggestionType;
use triage::repositories::{AlertRepository, NewAlert, NewWebhookEvent, WebhookEventRepository};
use uuid::Uuid;

mod test_utils;
use test_utils::{base_instant, setup_test_db};

fn event(delivery_id: &str, received_at: chrono::DateTime<chrono::Utc>) -> NewWebhookEvent {
    NewWebhookEvent {
        delivery_id: delivery_id.to_string(),
        event_type: "issues".to_string(),
        action: "opened".to_string(),
        repository_full_name: "octo/widgets".to_string(),
        sender_login: "octocat".to_string(),
        payload: json!({"action": "opened"}),
        received_at,
    }
}

#[tokio::test]
async fn test_windows_agree_across_offsets() {
    let db = setup_test_db().await.unwrap();
    let instant = base_instant();

    let writer = FixedClock::new(instant.with_timezone(&FixedOffset::east_opt(5 * 3600 + 1800).unwrap()));
    let events = WebhookEventRepository::new(db.clone());
    let alerts = AlertRepository::new(db.clone());

    for (id, hours_ago) in [("a", 2), ("b", 8), ("c", 20), ("d", 30)] {
        let at = writer.now() - Duration::hours(hours_ago);
        events.record_event(event(id, at)).await.unwrap();
        alerts
            .record_alert(NewAlert {
                delivery_id: id.to_string(),
                rule_id: Uuid::new_v4(),
                event_type: "issues".to_string(),
                action: "opened".to_string(),
                suggestion_type: SuggestionType::Label,
                suggestion_value: "bug".to_string(),
                reason: "test".to_string(),
                created_at: at,
            })
            .await
            .unwrap();
    }

    let reader = FixedClock::new(instant.with_timezone(&FixedOffset::west_opt(8 * 3600).unwrap()));
    let aggregator = MetricsAggregator::new(db, Arc::new(reader));

    let expected = [
        (MetricsWindow::SixHours, 1),
        (MetricsWindow::TwelveHours, 2),
        (MetricsWindow::TwentyFourHours, 3),
    ];
    for (window, count) in expected {
        let overview = aggregator.overview(window).await.unwrap();
        assert_eq!(overview.events, count, "events in {window}");
        assert_eq!(overview.alerts, count, "alerts in {window}");
        assert_eq!(overview.since, instant - window.duration());
    }
}

#[tokio::test]
async fn test_row_written_now_is_inside_every_window() {
    let db = setup_test_db().await.unwrap();
    let clock = FixedClock::new(base_instant());
    WebhookEventRepository::new(db.clone())
        .record_event(event("now", clock.now()))
        .await
        .unwrap();

    let aggregator = MetricsAggregator::new(db, Arc::new(clock.clone()));
    for window in MetricsWindow::ALL {
        assert_eq!(aggregator.overview(window).await.unwrap().events, 1);
    }

    // Exactly at the boundary the row is still counted; one second later it is not.
    clock.advance(Duration::hours(6));
    assert_eq!(
        aggregator
            .overview(MetricsWindow::SixHours)
            .await
            .unwrap()
            .events,
        1
    );
    clock.advance(Duration::seconds(1));
    assert_eq!(
        aggregator
            .overview(MetricsWindow::SixHours)
            .await
            .unwrap()
            .events,
        0
    );
}
