//! The local trust registry: persistence, remote sync, bootstrap.

use chrono::Duration;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use trustchain_core::{RegistrySyncConfig, Timestamp};

use crate::error::{PolicyError, PolicyResult};
use crate::record::{TrustRecord, TrustStatus, TrustTier};

/// Server ids eligible for local-dev auto-bootstrap.
const LOCAL_BOOTSTRAP_ALLOW_LIST: &[&str] = &["local-tools", "workspace-tools", "dev-sandbox"];

/// Validity window granted to bootstrap records.
const LOCAL_BOOTSTRAP_WINDOW_HOURS: i64 = 24;

/// Per-server trust records, optionally persisted to a JSON file.
///
/// Records are keyed by server id. Sync and revocation replace records in
/// place; nothing is ever silently deleted.
#[derive(Debug, Default)]
pub struct TrustRegistry {
    records: BTreeMap<String, TrustRecord>,
    path: Option<PathBuf>,
}

/// One server entry in the trust authority's sync response.
#[derive(Debug, Deserialize)]
struct SyncedServer {
    server_id: String,
    issuer: String,
    fingerprint: String,
    valid_from: Timestamp,
    valid_to: Timestamp,
    #[serde(default)]
    status: Option<TrustStatus>,
    #[serde(default)]
    revoked: Option<bool>,
    #[serde(default)]
    trust_tier: TrustTier,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    servers: Vec<SyncedServer>,
}

impl TrustRegistry {
    /// An empty, in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry backed by a JSON file.
    ///
    /// A missing or malformed file starts the registry empty rather than
    /// failing: losing a corrupt cache is recoverable, refusing to start
    /// is not.
    #[must_use]
    pub fn with_persistence(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = load_records(&path);
        Self {
            records,
            path: Some(path),
        }
    }

    /// Look up a server's record. Revoked records are returned too.
    #[must_use]
    pub fn get(&self, server_id: &str) -> Option<&TrustRecord> {
        self.records.get(server_id)
    }

    /// Number of records (all states).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert or replace a record.
    ///
    /// # Errors
    ///
    /// Persistence failures only; the in-memory update always happens.
    pub fn upsert(&mut self, record: TrustRecord) -> PolicyResult<()> {
        debug!(server_id = %record.server_id, tier = %record.tier, "trust record upserted");
        self.records.insert(record.server_id.clone(), record);
        self.persist()
    }

    /// Revoke a server's trust. The record stays queryable as revoked.
    ///
    /// Returns `false` when no record exists.
    ///
    /// # Errors
    ///
    /// Persistence failures only.
    pub fn revoke(&mut self, server_id: &str) -> PolicyResult<bool> {
        match self.records.get_mut(server_id) {
            Some(record) => {
                record.revoke();
                warn!(server_id = %server_id, "server trust revoked");
                self.persist()?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Auto-trust a known local dev server for a bounded window.
    ///
    /// # Errors
    ///
    /// [`PolicyError::BootstrapNotAllowed`] for ids outside the fixed
    /// allow list, plus persistence failures.
    pub fn bootstrap_local(&mut self, server_id: &str) -> PolicyResult<TrustRecord> {
        if !LOCAL_BOOTSTRAP_ALLOW_LIST.contains(&server_id) {
            return Err(PolicyError::BootstrapNotAllowed {
                server_id: server_id.to_string(),
            });
        }
        let record = TrustRecord::local_bootstrap(
            server_id,
            Duration::hours(LOCAL_BOOTSTRAP_WINDOW_HOURS),
        );
        info!(server_id = %server_id, "local server bootstrapped");
        self.records.insert(server_id.to_string(), record.clone());
        self.persist()?;
        Ok(record)
    }

    /// Pull records from the trust authority and merge them in.
    ///
    /// Existing records are replaced, new ones inserted; records absent
    /// from the response are left untouched. Returns how many records the
    /// response carried.
    ///
    /// # Errors
    ///
    /// [`PolicyError::SyncTimeout`] when the request exceeds the configured
    /// timeout, [`PolicyError::SyncFailure`] for any other transport or
    /// body problem, plus persistence failures.
    pub async fn sync(&mut self, config: &RegistrySyncConfig) -> PolicyResult<usize> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PolicyError::SyncFailure(e.to_string()))?;
        let url = format!(
            "{}/api/mcp-trust/servers",
            config.base_url.trim_end_matches('/')
        );

        let response = client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                PolicyError::SyncTimeout {
                    timeout_ms: config.timeout_ms,
                }
            } else {
                PolicyError::SyncFailure(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(PolicyError::SyncFailure(format!(
                "trust authority answered with status {}",
                response.status()
            )));
        }
        let body: SyncResponse = response
            .json()
            .await
            .map_err(|e| PolicyError::SyncFailure(e.to_string()))?;

        let count = body.servers.len();
        for server in body.servers {
            let revoked = server.revoked.unwrap_or(false)
                || server.status == Some(TrustStatus::Revoked);
            let record = TrustRecord {
                server_id: server.server_id.clone(),
                issuer: server.issuer,
                fingerprint: server.fingerprint,
                valid_from: server.valid_from,
                valid_to: server.valid_to,
                revoked,
                status: if revoked {
                    TrustStatus::Revoked
                } else {
                    server.status.unwrap_or_default()
                },
                tier: server.trust_tier,
            };
            self.records.insert(server.server_id, record);
        }
        info!(count, "trust registry synced");
        self.persist()?;
        Ok(count)
    }

    /// Write the registry to its backing file, if one is configured.
    fn persist(&self) -> PolicyResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let records: Vec<&TrustRecord> = self.records.values().collect();
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| PolicyError::SerializationError(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Read records from disk. Missing or malformed files yield an empty map.
fn load_records(path: &Path) -> BTreeMap<String, TrustRecord> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(_) => return BTreeMap::new(),
    };
    match serde_json::from_str::<Vec<TrustRecord>>(&data) {
        Ok(records) => records
            .into_iter()
            .map(|r| (r.server_id.clone(), r))
            .collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "trust registry file malformed, starting empty");
            BTreeMap::new()
        },
    }
}
