//! Keyword rule evaluation.

use tracing::{debug, warn};

use super::Suggestion;
use super::text::designated_text;
use crate::error::RepositoryError;
use crate::models::{rule, webhook_event};
use crate::repositories::RuleRepository;

/// Returns one suggestion per rule that fires on `event`.
///
/// A rule fires when it is active, its event type equals the event's ignoring
/// case, and its keyword occurs in the event's designated text ignoring case.
/// Every firing rule contributes; there is no first-match short circuit.
/// Blank keywords never fire.
pub fn match_rules(event: &webhook_event::Model, rules: &[rule::Model]) -> Vec<Suggestion> {
    let haystack = designated_text(&event.payload).to_lowercase();

    rules
        .iter()
        .filter(|rule| rule.is_active)
        .filter(|rule| rule.event_type.trim().eq_ignore_ascii_case(event.event_type.trim()))
        .filter_map(|rule| {
            let keyword = rule.keyword.trim().to_lowercase();
            if keyword.is_empty() || !haystack.contains(&keyword) {
                return None;
            }

            let Some(suggestion_type) = rule.suggestion_kind() else {
                warn!(
                    rule_id = %rule.id,
                    suggestion_type = %rule.suggestion_type,
                    "Skipping rule with unknown suggestion type"
                );
                return None;
            };

            Some(Suggestion {
                rule_id: rule.id,
                suggestion_type,
                suggestion_value: rule.suggestion_value.clone(),
                reason: rule.reason.clone(),
            })
        })
        .collect()
}

/// Loads the rules active at evaluation time and applies [`match_rules`].
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: RuleRepository,
}

impl RuleMatcher {
    pub fn new(rules: RuleRepository) -> Self {
        Self { rules }
    }

    pub async fn match_event(
        &self,
        event: &webhook_event::Model,
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        let candidates = self.rules.active_for_event_type(&event.event_type).await?;
        let suggestions = match_rules(event, &candidates);

        debug!(
            delivery_id = %event.delivery_id,
            event_type = %event.event_type,
            candidates = candidates.len(),
            matched = suggestions.len(),
            "Rules evaluated"
        );

        Ok(suggestions)
    }
}
