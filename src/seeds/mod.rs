//! Database seeding functionality
//!
//! Rules have no write endpoint; operators ship them as a JSON file that is
//! applied at startup.

pub mod rules;

pub use rules::{RuleSeed, load_rule_seeds, seed_rules};
