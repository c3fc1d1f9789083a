//! # Metrics Aggregator
//!
//! Rolling-window counts over the event, alert, failure and attempt stores.
//!
//! The window start is `clock.now() - window`, and every stored timestamp was
//! written from the same kind of clock, normalised to UTC. Mixing a local-time
//! clock on either side would not raise an error; the count would silently
//! come back as zero.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::clock::SharedClock;
use crate::error::RepositoryError;
use crate::repositories::{
    ActionAttemptRepository, ActionFailureRepository, AlertRepository, WebhookEventRepository,
};

/// Supported look-back windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum MetricsWindow {
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHours,
}

impl MetricsWindow {
    pub const ALL: [MetricsWindow; 3] = [
        MetricsWindow::SixHours,
        MetricsWindow::TwelveHours,
        MetricsWindow::TwentyFourHours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsWindow::SixHours => "6h",
            MetricsWindow::TwelveHours => "12h",
            MetricsWindow::TwentyFourHours => "24h",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            MetricsWindow::SixHours => Duration::hours(6),
            MetricsWindow::TwelveHours => Duration::hours(12),
            MetricsWindow::TwentyFourHours => Duration::hours(24),
        }
    }
}

impl fmt::Display for MetricsWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported window '{0}'; expected one of 6h, 12h, 24h")]
pub struct InvalidWindow(pub String);

impl FromStr for MetricsWindow {
    type Err = InvalidWindow;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        MetricsWindow::ALL
            .into_iter()
            .find(|window| window.as_str() == normalized)
            .ok_or_else(|| InvalidWindow(value.to_string()))
    }
}

/// Aggregate returned by [`MetricsAggregator::overview`].
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Overview {
    #[schema(value_type = String, example = "24h")]
    pub window: MetricsWindow,
    /// Start of the window (inclusive), UTC
    pub since: DateTime<Utc>,
    /// Instant the aggregate was computed, UTC
    pub generated_at: DateTime<Utc>,
    pub events: u64,
    pub alerts: u64,
    pub failures: u64,
    /// Succeeded / finished actions in the window; null when none finished
    pub success_rate: Option<f64>,
    /// Nearest-rank 95th percentile of finished action durations
    pub p95_latency_ms: Option<i64>,
}

/// Read path computing [`Overview`]s.
#[derive(Clone)]
pub struct MetricsAggregator {
    events: WebhookEventRepository,
    alerts: AlertRepository,
    failures: ActionFailureRepository,
    attempts: ActionAttemptRepository,
    clock: SharedClock,
}

impl MetricsAggregator {
    pub fn new(db: Arc<DatabaseConnection>, clock: SharedClock) -> Self {
        Self {
            events: WebhookEventRepository::new(db.clone()),
            alerts: AlertRepository::new(db.clone()),
            failures: ActionFailureRepository::new(db.clone()),
            attempts: ActionAttemptRepository::new(db),
            clock,
        }
    }

    pub async fn overview(&self, window: MetricsWindow) -> Result<Overview, RepositoryError> {
        let generated_at = self.clock.now();
        let since = generated_at - window.duration();

        let events = self.events.count_since(since).await?;
        let alerts = self.alerts.count_since(since).await?;
        let failures = self.failures.count_since(since).await?;
        let stats = self.attempts.stats_since(since).await?;

        let success_rate = match stats.finished() {
            0 => None,
            finished => Some(stats.succeeded as f64 / finished as f64),
        };

        Ok(Overview {
            window,
            since,
            generated_at,
            events,
            alerts,
            failures,
            success_rate,
            p95_latency_ms: percentile_nearest_rank(stats.durations_ms, 95),
        })
    }
}

/// Nearest-rank percentile: the smallest value with at least `pct`% of the
/// samples at or below it.
pub fn percentile_nearest_rank(mut samples: Vec<i64>, pct: u32) -> Option<i64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();
    let n = samples.len();
    let rank = (pct.min(100) as usize * n).div_ceil(100).max(1);
    samples.get(rank - 1).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::models::{AttemptStatus, SuggestionType};
    use crate::repositories::{NewAlert, NewWebhookEvent};
    use crate::test_support::{base_instant, setup_test_db};
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    async fn seed_event(repo: &WebhookEventRepository, id: &str, at: DateTime<Utc>) {
        repo.record_event(NewWebhookEvent {
            delivery_id: id.to_string(),
            event_type: "issues".to_string(),
            action: "opened".to_string(),
            repository_full_name: "octo/widgets".to_string(),
            sender_login: "octocat".to_string(),
            payload: json!({}),
            received_at: at,
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_window_parsing() {
        assert_eq!("6h".parse::<MetricsWindow>(), Ok(MetricsWindow::SixHours));
        assert_eq!(" 12H ".parse::<MetricsWindow>(), Ok(MetricsWindow::TwelveHours));
        assert_eq!("24h".parse::<MetricsWindow>(), Ok(MetricsWindow::TwentyFourHours));
        assert!("48h".parse::<MetricsWindow>().is_err());
        assert!("".parse::<MetricsWindow>().is_err());
        assert_eq!(MetricsWindow::TwelveHours.duration(), Duration::hours(12));
    }

    #[test]
    fn test_nearest_rank_percentile() {
        assert_eq!(percentile_nearest_rank(vec![], 95), None);
        assert_eq!(percentile_nearest_rank(vec![42], 95), Some(42));
        assert_eq!(percentile_nearest_rank((1..=20).collect(), 95), Some(19));
        assert_eq!(percentile_nearest_rank((1..=100).rev().collect(), 95), Some(95));
        assert_eq!(percentile_nearest_rank(vec![10, 20, 30], 95), Some(30));
    }

    #[tokio::test]
    async fn test_overview_counts_rows_inside_window() {
        let db = setup_test_db().await;
        let now = base_instant();
        let events = WebhookEventRepository::new(db.clone());
        seed_event(&events, "recent", now - Duration::hours(1)).await;
        seed_event(&events, "day-old", now - Duration::hours(23)).await;
        seed_event(&events, "stale", now - Duration::hours(25)).await;

        AlertRepository::new(db.clone())
            .record_alert(NewAlert {
                delivery_id: "recent".to_string(),
                rule_id: Uuid::new_v4(),
                event_type: "issues".to_string(),
                action: "opened".to_string(),
                suggestion_type: SuggestionType::Label,
                suggestion_value: "bug".to_string(),
                reason: "bug report".to_string(),
                created_at: now - Duration::hours(1),
            })
            .await
            .unwrap();

        let aggregator = MetricsAggregator::new(db, Arc::new(FixedClock::new(now)));

        let day = aggregator
            .overview(MetricsWindow::TwentyFourHours)
            .await
            .unwrap();
        assert_eq!(day.events, 2);
        assert_eq!(day.alerts, 1);
        assert_eq!(day.failures, 0);
        assert_eq!(day.since, now - Duration::hours(24));
        assert_eq!(day.generated_at, now);
        assert_eq!(day.success_rate, None);
        assert_eq!(day.p95_latency_ms, None);

        let six = aggregator.overview(MetricsWindow::SixHours).await.unwrap();
        assert_eq!(six.events, 1);
    }

    #[tokio::test]
    async fn test_overview_success_rate_and_latency() {
        let db = setup_test_db().await;
        let now = base_instant();
        let attempts = ActionAttemptRepository::new(db.clone());

        for (status, ms) in [
            (AttemptStatus::Succeeded, 100),
            (AttemptStatus::Succeeded, 200),
            (AttemptStatus::Succeeded, 300),
            (AttemptStatus::Failed, 4_000),
        ] {
            let row = attempts.start(None, "d", "label", now).await.unwrap();
            attempts
                .finish(row.id, status, 1, None, ms, now)
                .await
                .unwrap();
        }

        let overview = MetricsAggregator::new(db, Arc::new(FixedClock::new(now)))
            .overview(MetricsWindow::SixHours)
            .await
            .unwrap();

        assert_eq!(overview.success_rate, Some(0.75));
        assert_eq!(overview.p95_latency_ms, Some(4_000));
    }

    #[tokio::test]
    async fn test_overview_is_skew_proof_across_clock_offsets() {
        let db = setup_test_db().await;
        let instant = base_instant();

        // Writer runs with a +09:00 local clock, reader with -05:00; same instant.
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let write_clock = FixedClock::new(instant.with_timezone(&tokyo));
        let read_clock = FixedClock::new(instant.with_timezone(&new_york));

        let events = WebhookEventRepository::new(db.clone());
        let stamp = write_clock.now();
        seed_event(&events, "h1", stamp - Duration::hours(1)).await;
        seed_event(&events, "h23", stamp - Duration::hours(23)).await;
        seed_event(&events, "h25", stamp - Duration::hours(25)).await;

        let overview = MetricsAggregator::new(db.clone(), Arc::new(read_clock))
            .overview(MetricsWindow::TwentyFourHours)
            .await
            .unwrap();
        assert_eq!(overview.events, 2);

        // A reader whose clock runs 30 minutes ahead still sees the same rows.
        let ahead = FixedClock::new(
            new_york
                .from_utc_datetime(&(instant + Duration::minutes(30)).naive_utc()),
        );
        let overview = MetricsAggregator::new(db, Arc::new(ahead))
            .overview(MetricsWindow::TwentyFourHours)
            .await
            .unwrap();
        assert_eq!(overview.events, 2);
    }
}
