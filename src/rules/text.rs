//! Field extraction from raw GitHub payloads.
//!
//! Missing fields fall back to sentinels instead of failing intake: the
//! repository and sender become `unknown`, the action becomes empty. The
//! action executor refuses to act on the `unknown` repository.

use serde_json::Value;

/// Placeholder stored when the payload does not name a repository or sender.
pub const UNKNOWN: &str = "unknown";

/// Identity fields of a delivery, as stored on the event row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIdentity {
    pub action: String,
    pub repository_full_name: String,
    pub sender_login: String,
}

pub fn event_identity(payload: &Value) -> EventIdentity {
    EventIdentity {
        action: string_at(payload, &["action"]).unwrap_or_default(),
        repository_full_name: string_at(payload, &["repository", "full_name"])
            .unwrap_or_else(|| UNKNOWN.to_string()),
        sender_login: string_at(payload, &["sender", "login"])
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

/// Text searched for rule keywords: title and body of the issue or pull
/// request, plus the comment body on comment events. Parts are joined with
/// newlines so a keyword never matches across a field boundary.
pub fn designated_text(payload: &Value) -> String {
    const FIELDS: [&[&str]; 5] = [
        &["issue", "title"],
        &["issue", "body"],
        &["pull_request", "title"],
        &["pull_request", "body"],
        &["comment", "body"],
    ];

    FIELDS
        .iter()
        .filter_map(|path| string_at(payload, path))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Issue or pull request number the event refers to.
pub fn issue_number(payload: &Value) -> Option<i64> {
    const PATHS: [&[&str]; 3] = [&["issue", "number"], &["pull_request", "number"], &["number"]];

    PATHS
        .iter()
        .find_map(|path| value_at(payload, path).and_then(Value::as_i64))
}

fn value_at<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |current, key| current.get(*key))
}

fn string_at(payload: &Value, path: &[&str]) -> Option<String> {
    value_at(payload, path)
        .and_then(Value::as_str)
        .map(str::to_string)
}
