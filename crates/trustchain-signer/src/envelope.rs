//! The signed envelope attached to outgoing tool calls.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use trustchain_core::{
    AgentId, Certificate, ExecutionContext, SessionId, TenantId, Timestamp, ToolArgs,
};
use trustchain_crypto::Algorithm;

/// An algorithm-prefixed signature (`<algorithm>:<base64>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireSignature {
    /// Algorithm that produced the signature.
    pub algorithm: Algorithm,
    /// Raw signature bytes (64 for Ed25519, 32 for HMAC-SHA256).
    pub bytes: Vec<u8>,
}

impl WireSignature {
    /// Build from algorithm and raw bytes.
    #[must_use]
    pub fn new(algorithm: Algorithm, bytes: Vec<u8>) -> Self {
        Self { algorithm, bytes }
    }
}

impl fmt::Display for WireSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::Engine;
        write!(
            f,
            "{}:{}",
            self.algorithm.as_str(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl FromStr for WireSignature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use base64::Engine;
        let (prefix, encoded) = s
            .split_once(':')
            .ok_or_else(|| format!("missing algorithm prefix in signature: {s}"))?;
        let algorithm =
            Algorithm::parse(prefix).ok_or_else(|| format!("unknown algorithm: {prefix}"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("invalid base64 signature: {e}"))?;
        Ok(Self { algorithm, bytes })
    }
}

impl Serialize for WireSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for WireSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The signed record attached to a tool call (the `trustchain` wire field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Algorithm-prefixed signature over the canonical payload.
    pub signature: WireSignature,
    /// Unique operation id (`op_<uuid>`).
    pub nonce: String,
    /// Agent that produced the call.
    pub agent_id: AgentId,
    /// Session the call belongs to.
    pub session_id: SessionId,
    /// When the call was signed (RFC 3339).
    pub timestamp: Timestamp,
    /// The user request this call serves.
    pub user_query: String,
    /// Per-session sequence number (1-based, strictly increasing).
    pub sequence: u64,
    /// Version of the signing schema.
    pub signature_schema_version: String,
    /// Id of the signing key.
    pub key_id: String,
    /// Tenant scope, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    /// Signing algorithm (duplicated from the signature prefix for
    /// consumers that do not parse prefixes).
    pub algorithm: Algorithm,
    /// Base64 public key (absent for symmetric signatures).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Signature of the previous envelope in this session (paid tiers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_signature: Option<String>,
    /// Embedded issuer metadata.
    pub certificate: Certificate,
    /// Free-form decision context (why the agent made this call).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_context: Option<Value>,
    /// Where the call is executing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<ExecutionContext>,
}

impl Envelope {
    /// Attach this envelope to an outgoing request object under the
    /// `trustchain` field.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if the envelope cannot be encoded.
    pub fn attach_to(&self, request: &mut Value) -> Result<(), serde_json::Error> {
        let encoded = serde_json::to_value(self)?;
        if let Value::Object(map) = request {
            map.insert("trustchain".to_string(), encoded);
        }
        Ok(())
    }
}

/// Build the canonical signing payload for a tool call.
///
/// The same function runs at signing and at verification; the envelope's
/// recorded `sequence`, `timestamp`, `key_id`, `tenant_id`, and
/// `execution_context` feed back in so verification reproduces the exact
/// bytes. Absent optional fields serialize as `null` to keep the key set
/// fixed.
#[must_use]
pub fn signing_payload(
    tool: &str,
    args: &ToolArgs,
    execution_context: Option<&ExecutionContext>,
    key_id: &str,
    sequence: u64,
    schema_version: &str,
    tenant_id: Option<&TenantId>,
    timestamp: &Timestamp,
) -> Value {
    let mut payload = Map::new();
    payload.insert("arguments".to_string(), args.to_value());
    payload.insert(
        "execution_context".to_string(),
        execution_context
            .and_then(|ctx| serde_json::to_value(ctx).ok())
            .unwrap_or(Value::Null),
    );
    payload.insert("key_id".to_string(), Value::String(key_id.to_string()));
    payload.insert("name".to_string(), Value::String(tool.to_string()));
    payload.insert("sequence".to_string(), Value::from(sequence));
    payload.insert(
        "signature_schema_version".to_string(),
        Value::String(schema_version.to_string()),
    );
    payload.insert(
        "tenant_id".to_string(),
        tenant_id.map_or(Value::Null, |t| Value::String(t.0.clone())),
    );
    payload.insert(
        "timestamp".to_string(),
        Value::String(timestamp.to_rfc3339()),
    );
    Value::Object(payload)
}
