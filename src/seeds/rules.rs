//! Rule seeding from a JSON file.
//!
//! The file holds an array of rules:
//!
//! ```json
//! [
//!   {
//!     "event_type": "issues",
//!     "keyword": "crash",
//!     "suggestion_type": "label",
//!     "suggestion_value": "bug",
//!     "reason": "Crash reports are bugs"
//!   }
//! ]
//! ```
//!
//! A seed is skipped when a rule with the same event type, keyword and
//! suggestion already exists, so the file can be applied on every start.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::clock::SharedClock;
use crate::models::{SuggestionType, rule};
use crate::repositories::{NewRule, RuleRepository};

/// One entry of the seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSeed {
    pub event_type: String,
    pub keyword: String,
    pub suggestion_type: SuggestionType,
    pub suggestion_value: String,
    pub reason: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl RuleSeed {
    fn same_rule(&self, existing: &rule::Model) -> bool {
        existing.event_type.eq_ignore_ascii_case(self.event_type.trim())
            && existing.keyword == self.keyword
            && existing.suggestion_type == self.suggestion_type.as_str()
            && existing.suggestion_value == self.suggestion_value
    }
}

impl From<RuleSeed> for NewRule {
    fn from(seed: RuleSeed) -> Self {
        NewRule {
            event_type: seed.event_type,
            keyword: seed.keyword,
            suggestion_type: seed.suggestion_type,
            suggestion_value: seed.suggestion_value,
            reason: seed.reason,
            is_active: seed.is_active,
        }
    }
}

pub fn load_rule_seeds(path: impl AsRef<Path>) -> Result<Vec<RuleSeed>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse rules file {}", path.display()))
}

/// Inserts missing seeds and returns how many were created.
pub async fn seed_rules(
    repo: &RuleRepository,
    seeds: Vec<RuleSeed>,
    clock: &SharedClock,
) -> Result<usize> {
    let mut existing = repo.list(None).await?;
    let mut created = 0;

    for seed in seeds {
        if seed.keyword.trim().is_empty() {
            log::warn!(
                "Skipping {} rule seed with empty keyword",
                seed.event_type
            );
            continue;
        }
        if existing.iter().any(|rule| seed.same_rule(rule)) {
            log::debug!(
                "Rule '{}' for {} already exists, skipping",
                seed.keyword,
                seed.event_type
            );
            continue;
        }

        log::info!("Creating rule '{}' for {}", seed.keyword, seed.event_type);
        let rule = repo.create(seed.into(), clock.now()).await?;
        existing.push(rule);
        created += 1;
    }

    Ok(created)
}
