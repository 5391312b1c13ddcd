//! Last-applied and status records, persisted across runs
//!
//! Passwords cannot be read back from the server, so deciding whether a
//! role's password must be re-applied relies on what was applied last.
//! Only keyed digests are stored, never the secrets themselves.

use crate::api::{ResourceKey, ResourceKind};
use crate::error::StateError;
use crate::report::ReconcileStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

const STATE_FILE: &str = "state.toml";

const DIGEST_CONTEXT: &str = "pgconverge 2026-01-01 applied spec digest";

// ============================================================================
// State Structures
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
struct PersistedState {
    /// Keyed by `kind/namespace/name`
    #[serde(default)]
    applied: BTreeMap<String, AppliedRecord>,

    #[serde(default)]
    status: BTreeMap<String, StatusRecord>,

    last_updated: Option<DateTime<Utc>>,
}

/// What was last applied successfully for one resource
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    pub spec_digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_digest: Option<String>,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub ready: bool,
    #[serde(default)]
    pub error: String,
    pub updated_at: DateTime<Utc>,
}

/// Digests of a desired spec, comparable with an [`AppliedRecord`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub spec_digest: String,
    pub secret_digest: Option<String>,
}

impl Fingerprint {
    pub fn new<S: Serialize>(
        kind: ResourceKind,
        key: &ResourceKey,
        spec: &S,
        secret: Option<&str>,
    ) -> Self {
        let digest_key = blake3::derive_key(DIGEST_CONTEXT, record_key(kind, key).as_bytes());
        let digest = |bytes: &[u8]| blake3::keyed_hash(&digest_key, bytes).to_hex().to_string();

        let spec_json = serde_json::to_vec(spec).unwrap_or_default();
        Self {
            spec_digest: digest(&spec_json),
            secret_digest: secret.map(|s| digest(s.as_bytes())),
        }
    }

    /// Whether `record` was applied with the same secret
    pub fn same_secret(&self, record: &AppliedRecord) -> bool {
        self.secret_digest == record.secret_digest
    }
}

fn record_key(kind: ResourceKind, key: &ResourceKey) -> String {
    format!("{kind}/{}/{}", key.namespace, key.name)
}

// ============================================================================
// StateStore
// ============================================================================

/// Thread-safe record store; every change is written through to disk
#[derive(Debug)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: Mutex<PersistedState>,
}

impl StateStore {
    /// Load `state.toml` from `dir`, or start empty if it does not exist
    pub fn open(dir: &Path) -> Result<Self, StateError> {
        let path = dir.join(STATE_FILE);
        let state = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StateError::Read {
                path: path.clone(),
                source,
            })?;
            let state = toml::from_str(&content).map_err(|source| StateError::Parse {
                path: path.clone(),
                source,
            })?;
            log::debug!("Loaded state from {}", path.display());
            state
        } else {
            log::debug!("State file does not exist, using default state");
            PersistedState::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(PersistedState::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn state(&self) -> MutexGuard<'_, PersistedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn applied(&self, kind: ResourceKind, key: &ResourceKey) -> Option<AppliedRecord> {
        self.state().applied.get(&record_key(kind, key)).cloned()
    }

    /// Remember a successful apply
    pub fn record_applied(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
        fingerprint: Fingerprint,
    ) -> Result<(), StateError> {
        let mut state = self.state();
        state.applied.insert(
            record_key(kind, key),
            AppliedRecord {
                spec_digest: fingerprint.spec_digest,
                secret_digest: fingerprint.secret_digest,
                applied_at: Utc::now(),
            },
        );
        self.save(&mut state)
    }

    pub fn status(&self, kind: ResourceKind, key: &ResourceKey) -> Option<StatusRecord> {
        self.state().status.get(&record_key(kind, key)).cloned()
    }

    /// All statuses, keyed `kind/namespace/name`
    pub fn statuses(&self) -> Vec<(String, StatusRecord)> {
        self.state()
            .status
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Write a status; unchanged statuses keep their timestamp and are not
    /// rewritten
    pub fn record_status(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
        status: &ReconcileStatus,
    ) -> Result<(), StateError> {
        let mut state = self.state();
        let id = record_key(kind, key);
        if let Some(existing) = state.status.get(&id)
            && existing.ready == status.ready
            && existing.error == status.error
        {
            return Ok(());
        }
        state.status.insert(
            id,
            StatusRecord {
                ready: status.ready,
                error: status.error.clone(),
                updated_at: Utc::now(),
            },
        );
        self.save(&mut state)
    }

    /// Drop everything known about a resource that left the manifest
    pub fn forget(&self, kind: ResourceKind, key: &ResourceKey) -> Result<(), StateError> {
        let mut state = self.state();
        let id = record_key(kind, key);
        let removed = state.applied.remove(&id).is_some() | state.status.remove(&id).is_some();
        if removed {
            self.save(&mut state)
        } else {
            Ok(())
        }
    }

    fn save(&self, state: &mut PersistedState) -> Result<(), StateError> {
        state.last_updated = Some(Utc::now());
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| StateError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(&*state)?;

        // Write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, content)
            .and_then(|()| fs::rename(&tmp, path))
            .map_err(|source| StateError::Write {
                path: path.clone(),
                source,
            })?;
        log::trace!("Saved state to {}", path.display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn svc() -> ResourceKey {
        ResourceKey::new("default", "svc")
    }

    #[test]
    fn test_fingerprint_is_keyed_per_resource() {
        let a = Fingerprint::new(ResourceKind::Account, &svc(), &"spec", Some("p1"));
        let b = Fingerprint::new(ResourceKind::Account, &svc(), &"spec", Some("p1"));
        let other = Fingerprint::new(
            ResourceKind::Account,
            &ResourceKey::new("default", "other"),
            &"spec",
            Some("p1"),
        );

        assert_eq!(a, b);
        assert_ne!(a.secret_digest, other.secret_digest);
        assert_ne!(a.secret_digest.as_deref(), Some("p1"));
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let fingerprint = Fingerprint::new(ResourceKind::Account, &svc(), &"spec", Some("p1"));

        let store = StateStore::open(dir.path()).unwrap();
        store
            .record_applied(ResourceKind::Account, &svc(), fingerprint.clone())
            .unwrap();
        store
            .record_status(ResourceKind::Account, &svc(), &ReconcileStatus::ready())
            .unwrap();

        let reopened = StateStore::open(dir.path()).unwrap();
        let applied = reopened.applied(ResourceKind::Account, &svc()).unwrap();
        assert!(fingerprint.same_secret(&applied));
        assert!(reopened.status(ResourceKind::Account, &svc()).unwrap().ready);

        let content = fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
        assert!(content.contains("account/default/svc"));
        assert!(!content.contains("p1\""));
    }

    #[test]
    fn test_unchanged_status_keeps_timestamp() {
        let store = StateStore::in_memory();
        let failed = ReconcileStatus::failed("boom");
        store.record_status(ResourceKind::Grant, &svc(), &failed).unwrap();
        let first = store.status(ResourceKind::Grant, &svc()).unwrap();

        store.record_status(ResourceKind::Grant, &svc(), &failed).unwrap();
        assert_eq!(store.status(ResourceKind::Grant, &svc()).unwrap(), first);

        store
            .record_status(ResourceKind::Grant, &svc(), &ReconcileStatus::ready())
            .unwrap();
        assert!(store.status(ResourceKind::Grant, &svc()).unwrap().ready);
    }

    #[test]
    fn test_forget() {
        let store = StateStore::in_memory();
        store
            .record_status(ResourceKind::Database, &svc(), &ReconcileStatus::ready())
            .unwrap();
        store.forget(ResourceKind::Database, &svc()).unwrap();
        assert!(store.status(ResourceKind::Database, &svc()).is_none());
        assert!(store.statuses().is_empty());
    }

    #[test]
    fn test_corrupt_state_file_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), "applied = 3").unwrap();
        assert!(matches!(
            StateStore::open(dir.path()),
            Err(StateError::Parse { .. })
        ));
    }
}
