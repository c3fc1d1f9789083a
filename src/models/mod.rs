//! # Data Models
//!
//! This module contains all the data models used throughout the triage service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod action_attempt;
pub mod action_failure;
pub mod alert;
pub mod rule;
pub mod webhook_event;

pub use action_attempt::Entity as ActionAttempt;
pub use action_failure::Entity as ActionFailure;
pub use alert::Entity as Alert;
pub use rule::Entity as Rule;
pub use webhook_event::Entity as WebhookEvent;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "triage".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Kind of remediation a rule suggests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionType {
    Label,
    Comment,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Label => "label",
            SuggestionType::Comment => "comment",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored suggestion type is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown suggestion type: {0}")]
pub struct UnknownSuggestionType(pub String);

impl FromStr for SuggestionType {
    type Err = UnknownSuggestionType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "label" => Ok(SuggestionType::Label),
            "comment" => Ok(SuggestionType::Comment),
            other => Err(UnknownSuggestionType(other.to_string())),
        }
    }
}

/// Lifecycle of a remote action: `pending -> {succeeded | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Succeeded,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
