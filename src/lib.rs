//! # Triage Library
//!
//! GitHub webhook triage: signature-verified idempotent intake, keyword rule
//! matching, alerting, retried label/comment actions and windowed metrics.

pub mod actions;
pub mod aggregator;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod models;
pub mod repositories;
pub mod rules;
pub mod seeds;
pub mod server;
pub mod telemetry;
pub mod webhook_verification;
pub use migration;

#[cfg(test)]
mod test_support;
