//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! event, rule, alert, attempt and failure stores.

use serde::Deserialize;
use utoipa::IntoParams;

pub mod action_attempt;
pub mod action_failure;
pub mod alert;
pub mod rule;
pub mod webhook_event;

pub use action_attempt::{ActionAttemptRepository, AttemptStats};
pub use action_failure::{ActionFailureRepository, FailureFilter, NewActionFailure};
pub use alert::{AlertFilter, AlertRepository, NewAlert};
pub use rule::{NewRule, RuleRepository};
pub use webhook_event::{EventFilter, NewWebhookEvent, WebhookEventRepository};

pub const DEFAULT_PAGE_LIMIT: u64 = 50;
pub const MAX_PAGE_LIMIT: u64 = 200;

/// Limit/offset window applied to list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Maximum rows to return (default 50, capped at 200)
    pub limit: Option<u64>,
    /// Rows to skip
    pub offset: Option<u64>,
}

impl Pagination {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(Pagination::default().offset(), 0);
        assert_eq!(Pagination::new(0, 5).limit(), 1);
        assert_eq!(Pagination::new(10_000, 5).limit(), MAX_PAGE_LIMIT);
        assert_eq!(Pagination::new(10, 5).offset(), 5);
    }
}
