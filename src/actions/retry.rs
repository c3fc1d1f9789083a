//! Bounded retry around [`ActionExecutor`] with failure bookkeeping.
//!
//! Each action is an [`ActionAttempt`] moving `pending -> succeeded | failed`.
//! Remote errors are retried until the policy's bound; rejected input fails
//! immediately without consuming the budget. Exhaustion writes exactly one
//! `action_failures` row. Retried comments may be posted twice; that is the
//! cost of at-least-once delivery and can be turned off with
//! `retry_comments = false`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use rand::{Rng, thread_rng};
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ActionError, ActionExecutor, ActionKind, ActionRequest};
use crate::clock::SharedClock;
use crate::config::ActionRetryConfig;
use crate::models::AttemptStatus;
use crate::repositories::{ActionAttemptRepository, ActionFailureRepository, NewActionFailure};

/// Attempt bound and inter-attempt delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    pub retry_comments: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ActionRetryConfig::default())
    }
}

impl From<&ActionRetryConfig> for RetryPolicy {
    fn from(config: &ActionRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
            retry_comments: config.retry_comments,
        }
    }
}

impl RetryPolicy {
    /// Policy with no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
            retry_comments: true,
        }
    }

    /// Remote calls allowed for `kind`.
    pub fn attempts_for(&self, kind: &ActionKind) -> u32 {
        if kind.is_idempotent() || self.retry_comments {
            self.max_attempts
        } else {
            1
        }
    }

    /// Delay after the `completed`-th failed attempt: `base * 2^(completed - 1)`,
    /// capped at `max_delay`, then spread by ± jitter.
    pub fn delay_after(&self, completed: u32) -> Duration {
        let exponent = completed.saturating_sub(1).min(31) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let backoff = (base_ms * 2_f64.powi(exponent)).min(max_ms);

        let jittered = if self.jitter_factor > 0.0 && backoff > 0.0 {
            let spread = thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
            backoff * (1.0 + spread)
        } else {
            backoff
        };

        Duration::from_millis(jittered.max(0.0).round() as u64)
    }
}

/// In-memory state of one action while it is being driven.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionAttempt {
    status: AttemptStatus,
    attempt_count: u32,
    last_error: Option<ActionError>,
}

impl Default for ActionAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionAttempt {
    pub fn new() -> Self {
        Self {
            status: AttemptStatus::Pending,
            attempt_count: 0,
            last_error: None,
        }
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    /// Remote calls made. Rejected input does not count.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn last_error(&self) -> Option<&ActionError> {
        self.last_error.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// True when the attempt failed because the retry budget ran out.
    pub fn is_exhausted(&self) -> bool {
        self.status == AttemptStatus::Failed
            && self.last_error.as_ref().is_some_and(ActionError::is_retryable)
    }

    pub fn record_success(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.attempt_count += 1;
        self.status = AttemptStatus::Succeeded;
    }

    /// Counts a failed remote call. Moves to `failed` once `bound` calls were made.
    pub fn record_remote_failure(&mut self, error: ActionError, bound: u32) {
        if self.is_terminal() {
            return;
        }
        self.attempt_count += 1;
        self.last_error = Some(error);
        if self.attempt_count >= bound {
            self.status = AttemptStatus::Failed;
        }
    }

    /// Input or configuration problem detected before any call.
    pub fn record_rejection(&mut self, error: ActionError) {
        if self.is_terminal() {
            return;
        }
        self.last_error = Some(error);
        self.status = AttemptStatus::Failed;
    }
}

/// Identifies what an action is acting for.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub delivery_id: String,
    pub alert_id: Option<Uuid>,
}

/// Result of [`ActionRunner::run`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub attempt: ActionAttempt,
    /// `action_attempts` row, when it could be written
    pub attempt_id: Option<Uuid>,
    /// `action_failures` row written on exhaustion
    pub failure_id: Option<Uuid>,
    pub duration: Duration,
}

/// Drives one action to a terminal state.
#[derive(Clone)]
pub struct ActionRunner {
    executor: Arc<dyn ActionExecutor>,
    policy: RetryPolicy,
    attempts: ActionAttemptRepository,
    failures: ActionFailureRepository,
    clock: SharedClock,
}

impl ActionRunner {
    pub fn new(
        executor: Arc<dyn ActionExecutor>,
        policy: RetryPolicy,
        attempts: ActionAttemptRepository,
        failures: ActionFailureRepository,
        clock: SharedClock,
    ) -> Self {
        Self {
            executor,
            policy,
            attempts,
            failures,
            clock,
        }
    }

    pub async fn run(&self, context: &ActionContext, request: &ActionRequest) -> RunOutcome {
        let kind = request.kind.as_str();
        let bound = self.policy.attempts_for(&request.kind);
        let started = Instant::now();

        let attempt_id = match self
            .attempts
            .start(context.alert_id, &context.delivery_id, kind, self.clock.now())
            .await
        {
            Ok(row) => Some(row.id),
            Err(error) => {
                warn!(
                    delivery_id = %context.delivery_id,
                    action_kind = kind,
                    error = %error,
                    "Failed to persist pending action attempt"
                );
                None
            }
        };

        let mut attempt = ActionAttempt::new();
        while !attempt.is_terminal() {
            counter!("action_attempts_total", "action_kind" => kind).increment(1);

            match self.executor.execute(request).await {
                Ok(()) => attempt.record_success(),
                Err(error) if !error.is_retryable() => {
                    warn!(
                        delivery_id = %context.delivery_id,
                        action_kind = kind,
                        repository = %request.repository,
                        error = %error,
                        "Action rejected before any remote call"
                    );
                    attempt.record_rejection(error);
                }
                Err(error) => {
                    warn!(
                        delivery_id = %context.delivery_id,
                        action_kind = kind,
                        repository = %request.repository,
                        attempt = attempt.attempt_count() + 1,
                        max_attempts = bound,
                        error = %error,
                        "Remote action attempt failed"
                    );
                    attempt.record_remote_failure(error, bound);
                    if !attempt.is_terminal() {
                        sleep(self.policy.delay_after(attempt.attempt_count())).await;
                    }
                }
            }
        }

        let duration = started.elapsed();
        histogram!("action_duration_ms", "action_kind" => kind)
            .record(duration.as_secs_f64() * 1_000.0);

        let failure_id = match attempt.status() {
            AttemptStatus::Succeeded => {
                counter!("action_success_total", "action_kind" => kind).increment(1);
                info!(
                    delivery_id = %context.delivery_id,
                    action_kind = kind,
                    repository = %request.repository,
                    number = request.number,
                    attempts = attempt.attempt_count(),
                    "Action succeeded"
                );
                None
            }
            _ if attempt.is_exhausted() => {
                counter!("action_failure_total", "action_kind" => kind, "reason" => "exhausted")
                    .increment(1);
                self.record_failure(context, request, &attempt).await
            }
            _ => {
                counter!("action_failure_total", "action_kind" => kind, "reason" => "rejected")
                    .increment(1);
                None
            }
        };

        if let Some(id) = attempt_id {
            let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
            if let Err(error) = self
                .attempts
                .finish(
                    id,
                    attempt.status(),
                    attempt.attempt_count(),
                    attempt.last_error().map(ToString::to_string),
                    duration_ms,
                    self.clock.now(),
                )
                .await
            {
                warn!(
                    delivery_id = %context.delivery_id,
                    attempt_id = %id,
                    error = %error,
                    "Failed to finalise action attempt"
                );
            }
        }

        RunOutcome {
            attempt,
            attempt_id,
            failure_id,
            duration,
        }
    }

    async fn record_failure(
        &self,
        context: &ActionContext,
        request: &ActionRequest,
        attempt: &ActionAttempt,
    ) -> Option<Uuid> {
        let error = attempt
            .last_error()
            .map(ToString::to_string)
            .unwrap_or_default();

        warn!(
            delivery_id = %context.delivery_id,
            action_kind = request.kind.as_str(),
            repository = %request.repository,
            attempts = attempt.attempt_count(),
            error = %error,
            "Action failed after exhausting retries"
        );

        let failure = NewActionFailure {
            delivery_id: context.delivery_id.clone(),
            repository_full_name: request.repository.clone(),
            number: request.number,
            action_kind: request.kind.as_str().to_string(),
            payload: request.kind.request_body(),
            error,
            attempt_count: i32::try_from(attempt.attempt_count()).unwrap_or(i32::MAX),
            failed_at: self.clock.now(),
        };

        match self.failures.record(failure).await {
            Ok(row) => Some(row.id),
            Err(error) => {
                warn!(
                    delivery_id = %context.delivery_id,
                    error = %error,
                    "Failed to persist action failure"
                );
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repositories::{FailureFilter, Pagination};
    use crate::test_support::{fixed_clock, setup_test_db};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Replays queued results, repeating the last one when the queue runs dry.
    pub(crate) struct ScriptedExecutor {
        script: Mutex<VecDeque<Result<(), ActionError>>>,
        fallback: Result<(), ActionError>,
        pub calls: AtomicU32,
    }

    impl ScriptedExecutor {
        pub(crate) fn new(script: Vec<Result<(), ActionError>>) -> Self {
            let fallback = script.last().cloned().unwrap_or(Ok(()));
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ActionExecutor for ScriptedExecutor {
        async fn execute(&self, _request: &ActionRequest) -> Result<(), ActionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn server_error() -> Result<(), ActionError> {
        Err(ActionError::remote(Some(500), "Internal Server Error"))
    }

    fn label_request() -> ActionRequest {
        ActionRequest::new(
            "octo/widgets",
            7,
            ActionKind::Label {
                label: "priority-high".to_string(),
            },
        )
    }

    fn comment_request() -> ActionRequest {
        ActionRequest::new(
            "octo/widgets",
            7,
            ActionKind::Comment {
                body: "Looking into it".to_string(),
            },
        )
    }

    fn context() -> ActionContext {
        ActionContext {
            delivery_id: "d-1".to_string(),
            alert_id: Some(Uuid::new_v4()),
        }
    }

    async fn runner(
        executor: Arc<ScriptedExecutor>,
        policy: RetryPolicy,
    ) -> (ActionRunner, ActionAttemptRepository, ActionFailureRepository) {
        let db = setup_test_db().await;
        let attempts = ActionAttemptRepository::new(db.clone());
        let failures = ActionFailureRepository::new(db);
        let runner = ActionRunner::new(
            executor,
            policy,
            attempts.clone(),
            failures.clone(),
            Arc::new(fixed_clock()),
        );
        (runner, attempts, failures)
    }

    #[test]
    fn test_attempt_state_machine() {
        let mut attempt = ActionAttempt::new();
        assert_eq!(attempt.status(), AttemptStatus::Pending);

        attempt.record_remote_failure(ActionError::remote(Some(502), "bad gateway"), 3);
        assert_eq!(attempt.status(), AttemptStatus::Pending);
        assert_eq!(attempt.attempt_count(), 1);

        attempt.record_success();
        assert_eq!(attempt.status(), AttemptStatus::Succeeded);
        assert_eq!(attempt.attempt_count(), 2);

        // Terminal states are final.
        attempt.record_remote_failure(ActionError::remote(None, "late"), 3);
        assert_eq!(attempt.status(), AttemptStatus::Succeeded);
        assert_eq!(attempt.attempt_count(), 2);
    }

    #[test]
    fn test_rejection_does_not_consume_budget() {
        let mut attempt = ActionAttempt::new();
        attempt.record_rejection(ActionError::Validation("number must be positive".into()));

        assert_eq!(attempt.status(), AttemptStatus::Failed);
        assert_eq!(attempt.attempt_count(), 0);
        assert!(!attempt.is_exhausted());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(5000),
            jitter_factor: 0.0,
            retry_comments: true,
        };

        let delays: Vec<_> = (1..=6).map(|n| policy.delay_after(n).as_millis()).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn test_backoff_jitter_stays_in_band() {
        let policy = RetryPolicy {
            jitter_factor: 0.1,
            ..RetryPolicy::default()
        };

        for _ in 0..100 {
            let delay = policy.delay_after(2).as_millis();
            assert!((900..=1100).contains(&delay), "delay {delay} outside band");
        }
    }

    #[test]
    fn test_comments_get_single_attempt_when_retries_disabled() {
        let policy = RetryPolicy {
            retry_comments: false,
            ..RetryPolicy::immediate(3)
        };
        assert_eq!(policy.attempts_for(&label_request().kind), 3);
        assert_eq!(policy.attempts_for(&comment_request().kind), 1);
    }

    #[tokio::test]
    async fn test_success_after_transient_failure() {
        let executor = Arc::new(ScriptedExecutor::new(vec![server_error(), Ok(())]));
        let (runner, attempts, failures) =
            runner(executor.clone(), RetryPolicy::immediate(3)).await;

        let outcome = runner.run(&context(), &label_request()).await;

        assert_eq!(outcome.attempt.status(), AttemptStatus::Succeeded);
        assert_eq!(outcome.attempt.attempt_count(), 2);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
        assert!(outcome.failure_id.is_none());
        assert!(
            failures
                .list(&FailureFilter::default(), Pagination::default())
                .await
                .unwrap()
                .is_empty()
        );

        let row = attempts.find(outcome.attempt_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(row.status, "succeeded");
        assert_eq!(row.attempt_count, 2);
    }

    #[tokio::test]
    async fn test_exhaustion_records_exactly_one_failure() {
        let executor = Arc::new(ScriptedExecutor::new(vec![server_error()]));
        let (runner, attempts, failures) =
            runner(executor.clone(), RetryPolicy::immediate(3)).await;

        let outcome = runner.run(&context(), &label_request()).await;

        assert_eq!(outcome.attempt.status(), AttemptStatus::Failed);
        assert_eq!(outcome.attempt.attempt_count(), 3);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);

        let rows = failures
            .list(&FailureFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempt_count, 3);
        assert_eq!(rows[0].action_kind, "label");
        assert_eq!(rows[0].number, 7);
        assert!(rows[0].error.contains("500"));
        assert_eq!(Some(rows[0].id), outcome.failure_id);

        let row = attempts.find(outcome.attempt_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert_eq!(row.attempt_count, 3);
    }

    #[tokio::test]
    async fn test_validation_error_is_terminal_without_failure_row() {
        let executor = Arc::new(ScriptedExecutor::new(vec![Err(ActionError::Validation(
            "repository is missing".to_string(),
        ))]));
        let (runner, attempts, failures) =
            runner(executor.clone(), RetryPolicy::immediate(3)).await;

        let outcome = runner.run(&context(), &label_request()).await;

        assert_eq!(outcome.attempt.status(), AttemptStatus::Failed);
        assert_eq!(outcome.attempt.attempt_count(), 0);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.failure_id.is_none());
        assert!(
            failures
                .list(&FailureFilter::default(), Pagination::default())
                .await
                .unwrap()
                .is_empty()
        );

        let row = attempts.find(outcome.attempt_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert!(row.last_error.unwrap().contains("repository is missing"));
    }

    #[tokio::test]
    async fn test_comment_not_retried_when_disabled() {
        let executor = Arc::new(ScriptedExecutor::new(vec![server_error()]));
        let policy = RetryPolicy {
            retry_comments: false,
            ..RetryPolicy::immediate(3)
        };
        let (runner, _, failures) = runner(executor.clone(), policy).await;

        let outcome = runner.run(&context(), &comment_request()).await;

        assert_eq!(executor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempt.attempt_count(), 1);
        let rows = failures
            .list(&FailureFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attempt_count, 1);
    }
}
