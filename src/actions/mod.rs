//! # Remote Actions
//!
//! Label and comment actions executed against the GitHub issues API, wrapped
//! in a bounded retry loop that records terminal failures.

pub mod executor;
pub mod retry;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::SuggestionType;
use crate::rules::Suggestion;

pub use executor::{ActionExecutor, GitHubActionExecutor, GitHubExecutorConfig};
pub use retry::{ActionAttempt, ActionRunner, RetryPolicy, RunOutcome};

/// The closed set of remote actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    Label { label: String },
    Comment { body: String },
}

impl ActionKind {
    pub fn from_suggestion(suggestion: &Suggestion) -> Self {
        match suggestion.suggestion_type {
            SuggestionType::Label => ActionKind::Label {
                label: suggestion.suggestion_value.clone(),
            },
            SuggestionType::Comment => ActionKind::Comment {
                body: suggestion.suggestion_value.clone(),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Label { .. } => "label",
            ActionKind::Comment { .. } => "comment",
        }
    }

    /// Label or comment text.
    pub fn text(&self) -> &str {
        match self {
            ActionKind::Label { label } => label,
            ActionKind::Comment { body } => body,
        }
    }

    /// Re-applying a label is a no-op server side; re-posting a comment is not.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, ActionKind::Label { .. })
    }

    /// JSON body sent to the issues API.
    pub fn request_body(&self) -> Value {
        match self {
            ActionKind::Label { label } => json!({ "labels": [label] }),
            ActionKind::Comment { body } => json!({ "body": body }),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action against one issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// `owner/name`
    pub repository: String,
    pub number: i64,
    pub kind: ActionKind,
}

impl ActionRequest {
    pub fn new(repository: impl Into<String>, number: i64, kind: ActionKind) -> Self {
        Self {
            repository: repository.into(),
            number,
            kind,
        }
    }
}

/// Failure of a single remote action call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Input can never succeed; not retried.
    #[error("invalid action request: {0}")]
    Validation(String),

    /// Operator-side problem such as a missing credential; not retried.
    #[error("action executor misconfigured: {0}")]
    Misconfigured(String),

    /// Non-2xx status, transport error or timeout.
    #[error("remote call failed{}: {detail}", status_suffix(.status))]
    Remote { status: Option<u16>, detail: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {s}"))
        .unwrap_or_default()
}

impl ActionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Remote { .. })
    }

    pub fn remote(status: Option<u16>, detail: impl Into<String>) -> Self {
        ActionError::Remote {
            status,
            detail: detail.into(),
        }
    }
}
