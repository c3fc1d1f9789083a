//! # Rule Matching
//!
//! Evaluates stored events against maintainer-configured keyword rules.

pub mod matcher;
pub mod text;

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::SuggestionType;

pub use matcher::{RuleMatcher, match_rules};

/// Remediation proposed by one matching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Suggestion {
    pub rule_id: Uuid,
    pub suggestion_type: SuggestionType,
    pub suggestion_value: String,
    pub reason: String,
}
