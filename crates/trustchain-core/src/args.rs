//! Tool arguments and execution context.
//!
//! Arguments are modeled as a key-ordered map rather than an open
//! dictionary, so two calls that differ only in key insertion order are
//! the same call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ids::TenantId;

/// Key-ordered tool arguments.
///
/// Backed by a `BTreeMap`, so iteration (and serialization) order is
/// byte-lexicographic regardless of how the map was built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArgs(pub BTreeMap<String, Value>);

impl ToolArgs {
    /// An empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert an argument, returning `self` for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// View as a JSON value (object with sorted keys).
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Value>> for ToolArgs {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ToolArgs {
    type Error = Value;

    /// Convert a JSON object into arguments; any other value is returned
    /// unchanged as the error.
    fn try_from(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(other),
        }
    }
}

/// Where a signing session is running.
///
/// Embedded in the canonical payload so an envelope replayed from a
/// different instance or document mode verifies as a different call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Instance identifier (e.g. a deployment or container id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Conversation / context identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Document mode the agent is operating in, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_mode: Option<String>,
    /// Tenant scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

impl ExecutionContext {
    /// True when every field is unset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instance_id.is_none()
            && self.context_id.is_none()
            && self.document_mode.is_none()
            && self.tenant_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_key_order_independent() {
        let a = ToolArgs::new().with("b", 2).with("a", 1);
        let b = ToolArgs::new().with("a", 1).with("b", 2);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_args_from_json_object() {
        let args = ToolArgs::try_from(json!({"limit": 10})).unwrap();
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_args_from_non_object_rejected() {
        assert!(ToolArgs::try_from(json!([1, 2])).is_err());
        assert!(ToolArgs::try_from(json!("str")).is_err());
    }

    #[test]
    fn test_execution_context_empty() {
        assert!(ExecutionContext::default().is_empty());
        let ctx = ExecutionContext {
            instance_id: Some("i-1".to_string()),
            ..Default::default()
        };
        assert!(!ctx.is_empty());
    }
}
