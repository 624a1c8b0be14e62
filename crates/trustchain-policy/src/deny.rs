//! Locating policy-denial signals in remote tool-server responses.
//!
//! Servers wrap their payloads unpredictably: a denial may sit at the top
//! level, inside `content`/`result`/`data` envelopes, inside arrays, or as
//! a JSON document encoded into a `text` string. The walk here covers that
//! finite set of shapes instead of duck-typing arbitrary structures.

use serde_json::{Map, Value};

/// Wrapper keys a denial may hide under.
const WRAPPER_KEYS: &[&str] = &["text", "content", "result", "data"];

/// Nesting bound for the wrapper walk.
const MAX_DENY_DEPTH: usize = 16;

/// A policy denial extracted from a tool-server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDenial {
    /// Machine-readable deny code, if the server sent one.
    pub code: Option<String>,
    /// Human-readable message, if the server sent one.
    pub message: Option<String>,
    /// Name of the policy that fired, if the server sent one.
    pub policy: Option<String>,
}

/// Search a response for a denial signal.
///
/// A denial is signaled by `action == "deny"`, a non-empty `policy`
/// string, or `success == false` at any wrapper level. Returns the first
/// denial found, outermost first.
#[must_use]
pub fn extract_policy_denial(response: &Value) -> Option<PolicyDenial> {
    walk(response, 0)
}

fn walk(value: &Value, depth: usize) -> Option<PolicyDenial> {
    if depth > MAX_DENY_DEPTH {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(denial) = denial_at(map) {
                return Some(denial);
            }
            WRAPPER_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(|inner| walk(inner, depth + 1))
        },
        Value::Array(items) => items.iter().find_map(|item| walk(item, depth + 1)),
        // Some servers double-encode: a JSON document inside a string.
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(s).ok()?;
            walk(&parsed, depth + 1)
        },
        _ => None,
    }
}

fn denial_at(map: &Map<String, Value>) -> Option<PolicyDenial> {
    let denied = map.get("action").and_then(Value::as_str) == Some("deny")
        || map
            .get("policy")
            .and_then(Value::as_str)
            .is_some_and(|policy| !policy.is_empty())
        || map.get("success").and_then(Value::as_bool) == Some(false);
    if !denied {
        return None;
    }
    Some(PolicyDenial {
        code: map.get("code").and_then(Value::as_str).map(str::to_string),
        message: map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        policy: map
            .get("policy")
            .and_then(Value::as_str)
            .filter(|policy| !policy.is_empty())
            .map(str::to_string),
    })
}
