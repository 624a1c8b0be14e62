//! HTTP delegate for external (KMS/HSM) signing.
//!
//! The bridge never holds private key material. It probes `GET /health`
//! for the signer's identity and posts canonical payloads to
//! `POST /sign`.

use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use trustchain_core::SignerConfig;

use crate::error::{SignerError, SignerResult};

/// Minimum interval between health re-checks.
const HEALTH_RECHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Observed health of the external signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerHealthState {
    /// No probe has completed yet.
    Unknown,
    /// Last probe succeeded within latency budget.
    Healthy,
    /// Last probe succeeded but slowly; delegation still works.
    Degraded,
    /// Last probe failed; signing falls back to local keys.
    Down,
}

/// Snapshot of the last health probe.
#[derive(Debug, Clone)]
pub struct SignerHealth {
    /// Current state.
    pub state: SignerHealthState,
    /// Round-trip latency of the last successful probe.
    pub latency_ms: Option<u64>,
    /// Key id advertised by the signer, if any.
    pub key_id: Option<String>,
    /// Base64 public key advertised by the signer, if any.
    pub public_key: Option<String>,
}

impl SignerHealth {
    fn unknown() -> Self {
        Self {
            state: SignerHealthState::Unknown,
            latency_ms: None,
            key_id: None,
            public_key: None,
        }
    }

    /// Whether the signer advertised a complete identity (both key id
    /// and public key). Delegation requires one; without it the session
    /// stays on local keys.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.key_id.is_some() && self.public_key.is_some()
    }

    /// Whether delegation is currently usable.
    #[must_use]
    pub fn usable(&self) -> bool {
        matches!(
            self.state,
            SignerHealthState::Healthy | SignerHealthState::Degraded
        ) && self.has_identity()
    }
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    key_id: Option<String>,
    #[serde(default)]
    public_key: Option<String>,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    signature_base64: Option<String>,
}

/// Client for a remote signer service.
pub struct ExternalSignerBridge {
    client: reqwest::Client,
    config: SignerConfig,
    health: SignerHealth,
    last_check: Option<Instant>,
}

impl ExternalSignerBridge {
    /// Build a bridge for the configured signer.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::ExternalSignerFailure`] if the HTTP client
    /// cannot be constructed.
    pub fn new(config: SignerConfig) -> SignerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SignerError::ExternalSignerFailure(e.to_string()))?;
        Ok(Self {
            client,
            config,
            health: SignerHealth::unknown(),
            last_check: None,
        })
    }

    /// The last observed health snapshot.
    #[must_use]
    pub fn health(&self) -> &SignerHealth {
        &self.health
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn due_for_recheck(&self) -> bool {
        match self.last_check {
            None => true,
            Some(at) => at.elapsed() >= HEALTH_RECHECK_INTERVAL,
        }
    }

    /// Probe `GET /health`, debounced to one request per
    /// [`HEALTH_RECHECK_INTERVAL`]. Returns the updated snapshot.
    ///
    /// A failed probe marks the signer [`SignerHealthState::Down`]; it is
    /// not an error, because the session falls back to local signing.
    pub async fn health_check(&mut self) -> &SignerHealth {
        if !self.due_for_recheck() && self.health.state != SignerHealthState::Unknown {
            return &self.health;
        }
        self.last_check = Some(Instant::now());

        let started = Instant::now();
        let result = self.client.get(self.endpoint("health")).send().await;
        let latency = started.elapsed();

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(body) => {
                        let state = classify_latency(latency, self.config.timeout());
                        debug!(
                            latency_ms = latency.as_millis() as u64,
                            state = ?state,
                            "external signer health probe ok"
                        );
                        self.health = SignerHealth {
                            state,
                            latency_ms: Some(latency.as_millis() as u64),
                            key_id: body.key_id.or_else(|| self.config.key_id.clone()),
                            public_key: body
                                .public_key
                                .or_else(|| self.config.public_key.clone()),
                        };
                    },
                    Err(e) => {
                        warn!(error = %e, "external signer health body malformed");
                        self.health.state = SignerHealthState::Down;
                    },
                }
            },
            Ok(response) => {
                warn!(status = %response.status(), "external signer health probe rejected");
                self.health.state = SignerHealthState::Down;
            },
            Err(e) => {
                warn!(error = %e, "external signer unreachable");
                self.health.state = SignerHealthState::Down;
            },
        }
        &self.health
    }

    /// Delegate a signature over the canonical payload bytes.
    ///
    /// # Errors
    ///
    /// [`SignerError::ExternalSignerTimeout`] when the request exceeds the
    /// configured timeout; [`SignerError::ExternalSignerFailure`] for any
    /// other transport, status, or decoding failure.
    pub async fn sign(&mut self, payload: &[u8]) -> SignerResult<Vec<u8>> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
        let response = self
            .client
            .post(self.endpoint("sign"))
            .json(&serde_json::json!({ "payload_base64": encoded }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            self.health.state = SignerHealthState::Down;
            return Err(SignerError::ExternalSignerFailure(format!(
                "sign request rejected with status {}",
                response.status()
            )));
        }

        let body: SignResponse = response
            .json()
            .await
            .map_err(|e| SignerError::ExternalSignerFailure(e.to_string()))?;
        let encoded = body
            .signature
            .or(body.signature_base64)
            .ok_or_else(|| {
                SignerError::ExternalSignerFailure(
                    "sign response carried no signature field".to_string(),
                )
            })?;
        base64::engine::general_purpose::STANDARD
            .decode(&encoded)
            .map_err(|e| {
                SignerError::ExternalSignerFailure(format!("signature not valid base64: {e}"))
            })
    }

    fn transport_error(&mut self, e: reqwest::Error) -> SignerError {
        self.health.state = SignerHealthState::Down;
        if e.is_timeout() {
            SignerError::ExternalSignerTimeout {
                timeout_ms: self.config.timeout_ms,
            }
        } else {
            SignerError::ExternalSignerFailure(e.to_string())
        }
    }
}

impl std::fmt::Debug for ExternalSignerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSignerBridge")
            .field("base_url", &self.config.base_url)
            .field("state", &self.health.state)
            .finish_non_exhaustive()
    }
}

/// A probe that takes more than half the request timeout counts as
/// degraded.
fn classify_latency(latency: Duration, timeout: Duration) -> SignerHealthState {
    if latency * 2 >= timeout {
        SignerHealthState::Degraded
    } else {
        SignerHealthState::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_classification() {
        let timeout = Duration::from_millis(5_000);
        assert_eq!(
            classify_latency(Duration::from_millis(100), timeout),
            SignerHealthState::Healthy
        );
        assert_eq!(
            classify_latency(Duration::from_millis(2_500), timeout),
            SignerHealthState::Degraded
        );
        assert_eq!(
            classify_latency(Duration::from_millis(4_900), timeout),
            SignerHealthState::Degraded
        );
    }

    #[test]
    fn test_health_identity_gates_usability() {
        let mut health = SignerHealth::unknown();
        assert!(!health.usable());

        health.state = SignerHealthState::Healthy;
        assert!(!health.usable(), "identity is required for delegation");

        health.key_id = Some("k1".to_string());
        health.public_key = Some("cGs=".to_string());
        assert!(health.usable());

        health.state = SignerHealthState::Down;
        assert!(!health.usable());
    }

    #[test]
    fn test_endpoint_join() {
        let bridge =
            ExternalSignerBridge::new(SignerConfig::new("http://localhost:9000/")).unwrap();
        assert_eq!(bridge.endpoint("sign"), "http://localhost:9000/sign");
        assert_eq!(bridge.endpoint("health"), "http://localhost:9000/health");
    }

    #[test]
    fn test_sign_response_shapes() {
        let a: SignResponse = serde_json::from_str(r#"{"signature": "QUJD"}"#).unwrap();
        assert_eq!(a.signature.as_deref(), Some("QUJD"));

        let b: SignResponse =
            serde_json::from_str(r#"{"signature_base64": "QUJD"}"#).unwrap();
        assert_eq!(b.signature_base64.as_deref(), Some("QUJD"));

        let c: SignResponse = serde_json::from_str("{}").unwrap();
        assert!(c.signature.is_none() && c.signature_base64.is_none());
    }
}
