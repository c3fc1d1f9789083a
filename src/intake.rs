//! # Webhook Intake
//!
//! Orchestrates one delivery: verify, record, match, alert, dispatch.
//!
//! Verification, event recording, matching and alert inserts all finish
//! before [`IntakeService::handle`] returns. Remote actions run inline or on
//! spawned tasks depending on [`DispatchMode`]. No transaction spans the
//! stores: an event with some alerts and no action attempt yet is a valid
//! intermediate state.

use std::sync::Arc;

use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::actions::retry::ActionContext;
use crate::actions::{ActionExecutor, ActionKind, ActionRequest, ActionRunner, RetryPolicy};
use crate::clock::SharedClock;
use crate::config::DispatchMode;
use crate::error::{ApiError, RepositoryError};
use crate::models::{AttemptStatus, webhook_event};
use crate::repositories::{
    ActionAttemptRepository, ActionFailureRepository, AlertRepository, NewAlert,
    NewWebhookEvent, RuleRepository, WebhookEventRepository,
};
use crate::rules::text::{event_identity, issue_number};
use crate::rules::{RuleMatcher, Suggestion};
use crate::telemetry::{self, TraceContext};
use crate::webhook_verification::{SignatureVerifier, VerificationError};

/// Raw inputs of one webhook request.
#[derive(Debug, Clone, Default)]
pub struct WebhookDelivery {
    pub body: Vec<u8>,
    /// `X-Hub-Signature-256`
    pub signature: Option<String>,
    /// `X-GitHub-Event`
    pub event_type: Option<String>,
    /// `X-GitHub-Delivery`
    pub delivery_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error("missing required header {0}")]
    MissingHeader(&'static str),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("failed to persist delivery: {0}")]
    Store(#[from] RepositoryError),
}

impl From<IntakeError> for ApiError {
    fn from(error: IntakeError) -> Self {
        match error {
            IntakeError::Verification(err) => err.into(),
            other @ (IntakeError::MissingHeader(_) | IntakeError::InvalidPayload(_)) => {
                ApiError::bad_request(other.to_string())
            }
            IntakeError::Store(err) => err.into(),
        }
    }
}

/// Result of an inline action run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionSummary {
    pub alert_id: Option<Uuid>,
    pub action_kind: String,
    pub status: AttemptStatus,
    pub attempt_count: u32,
    pub error: Option<String>,
}

/// What happened to an accepted delivery.
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub event: webhook_event::Model,
    /// False for a redelivery of a known `delivery_id`
    pub is_new: bool,
    pub alert_ids: Vec<Uuid>,
    pub suggestions: Vec<Suggestion>,
    pub dispatch: DispatchMode,
    /// Filled only for inline dispatch
    pub actions: Vec<ActionSummary>,
}

struct ActionJob {
    context: ActionContext,
    request: ActionRequest,
}

/// Entry point for webhook deliveries.
#[derive(Clone)]
pub struct IntakeService {
    verifier: SignatureVerifier,
    events: WebhookEventRepository,
    matcher: RuleMatcher,
    alerts: AlertRepository,
    runner: ActionRunner,
    clock: SharedClock,
    dispatch: DispatchMode,
}

impl IntakeService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        clock: SharedClock,
        verifier: SignatureVerifier,
        executor: Arc<dyn ActionExecutor>,
        policy: RetryPolicy,
        dispatch: DispatchMode,
    ) -> Self {
        let runner = ActionRunner::new(
            executor,
            policy,
            ActionAttemptRepository::new(db.clone()),
            ActionFailureRepository::new(db.clone()),
            clock.clone(),
        );

        Self {
            verifier,
            events: WebhookEventRepository::new(db.clone()),
            matcher: RuleMatcher::new(RuleRepository::new(db.clone())),
            alerts: AlertRepository::new(db),
            runner,
            clock,
            dispatch,
        }
    }

    pub async fn handle(&self, delivery: WebhookDelivery) -> Result<IntakeOutcome, IntakeError> {
        self.verifier
            .verify(&delivery.body, delivery.signature.as_deref())?;

        let event_type = non_empty(delivery.event_type).ok_or(IntakeError::MissingHeader(
            "X-GitHub-Event",
        ))?;
        let delivery_id = non_empty(delivery.delivery_id).ok_or(IntakeError::MissingHeader(
            "X-GitHub-Delivery",
        ))?;

        let payload: Value = serde_json::from_slice(&delivery.body)
            .map_err(|e| IntakeError::InvalidPayload(e.to_string()))?;
        if !payload.is_object() {
            return Err(IntakeError::InvalidPayload(
                "payload must be a JSON object".to_string(),
            ));
        }

        let identity = event_identity(&payload);
        let (event, is_new) = self
            .events
            .record_event(NewWebhookEvent {
                delivery_id,
                event_type,
                action: identity.action,
                repository_full_name: identity.repository_full_name,
                sender_login: identity.sender_login,
                payload,
                received_at: self.clock.now(),
            })
            .await?;

        counter!("webhook_deliveries_total", "event_type" => event.event_type.clone())
            .increment(1);

        if !is_new {
            counter!("webhook_duplicates_total").increment(1);
            info!(
                delivery_id = %event.delivery_id,
                event_type = %event.event_type,
                "Duplicate delivery ignored"
            );
            return Ok(IntakeOutcome {
                event,
                is_new,
                alert_ids: Vec::new(),
                suggestions: Vec::new(),
                dispatch: self.dispatch,
                actions: Vec::new(),
            });
        }

        let suggestions = self.matcher.match_event(&event).await?;
        let jobs = self.record_alerts(&event, &suggestions).await;
        let alert_ids = jobs.iter().filter_map(|job| job.context.alert_id).collect();

        info!(
            delivery_id = %event.delivery_id,
            event_type = %event.event_type,
            action = %event.action,
            repository = %event.repository_full_name,
            suggestions = suggestions.len(),
            "Delivery recorded"
        );

        let actions = self.dispatch_actions(jobs).await;

        Ok(IntakeOutcome {
            event,
            is_new,
            alert_ids,
            suggestions,
            dispatch: self.dispatch,
            actions,
        })
    }

    /// Inserts one alert per suggestion. A failed insert is logged and the
    /// action still runs, without an alert id.
    async fn record_alerts(
        &self,
        event: &webhook_event::Model,
        suggestions: &[Suggestion],
    ) -> Vec<ActionJob> {
        let number = issue_number(&event.payload).unwrap_or_default();
        let mut jobs = Vec::with_capacity(suggestions.len());

        for suggestion in suggestions {
            let alert = self
                .alerts
                .record_alert(NewAlert {
                    delivery_id: event.delivery_id.clone(),
                    rule_id: suggestion.rule_id,
                    event_type: event.event_type.clone(),
                    action: event.action.clone(),
                    suggestion_type: suggestion.suggestion_type,
                    suggestion_value: suggestion.suggestion_value.clone(),
                    reason: suggestion.reason.clone(),
                    created_at: self.clock.now(),
                })
                .await;

            let alert_id = match alert {
                Ok(row) => {
                    counter!("alerts_created_total", "suggestion_type" => suggestion.suggestion_type.as_str())
                        .increment(1);
                    info!(
                        delivery_id = %event.delivery_id,
                        rule_id = %suggestion.rule_id,
                        alert_id = %row.id,
                        "Alert created"
                    );
                    Some(row.id)
                }
                Err(error) => {
                    warn!(
                        delivery_id = %event.delivery_id,
                        rule_id = %suggestion.rule_id,
                        error = %error,
                        "Failed to persist alert; dispatching action anyway"
                    );
                    None
                }
            };

            jobs.push(ActionJob {
                context: ActionContext {
                    delivery_id: event.delivery_id.clone(),
                    alert_id,
                },
                request: ActionRequest::new(
                    event.repository_full_name.clone(),
                    number,
                    ActionKind::from_suggestion(suggestion),
                ),
            });
        }

        jobs
    }

    async fn dispatch_actions(&self, jobs: Vec<ActionJob>) -> Vec<ActionSummary> {
        match self.dispatch {
            DispatchMode::Inline => {
                let mut summaries = Vec::with_capacity(jobs.len());
                for job in jobs {
                    let outcome = self.runner.run(&job.context, &job.request).await;
                    summaries.push(ActionSummary {
                        alert_id: job.context.alert_id,
                        action_kind: job.request.kind.as_str().to_string(),
                        status: outcome.attempt.status(),
                        attempt_count: outcome.attempt.attempt_count(),
                        error: outcome.attempt.last_error().map(ToString::to_string),
                    });
                }
                summaries
            }
            DispatchMode::Background => {
                let trace = telemetry::current_trace_id()
                    .map(TraceContext::new)
                    .unwrap_or_else(TraceContext::generate);
                for job in jobs {
                    let runner = self.runner.clone();
                    let trace = trace.clone();
                    tokio::spawn(async move {
                        telemetry::with_trace_context(trace, async move {
                            runner.run(&job.context, &job.request).await;
                        })
                        .await;
                    });
                }
                Vec::new()
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
