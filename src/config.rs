//! Manifest: the desired state, as TOML (or JSON)
//!
//! ```toml
//! [settings]
//! namespace = "prod"
//!
//! [[database]]
//! name = "main"
//! address = "db.internal:5432"
//! user = "admin"
//! password = "secret"
//! database = "app"
//! encoding = "UTF8"
//!
//! [[account]]
//! name = "svc"
//! database = "main"
//! role = "svc"
//! password = "p1"
//!
//! [[grant]]
//! name = "svc-rw"
//! database = "main"
//! privileges = ["select", "insert"]
//! to = "svc"
//! schema = "app"
//! ```

use crate::api::{AccountSpec, DEFAULT_NAMESPACE, DatabaseSpec, GrantSpec, ResourceKey, ResourceKind};
use crate::error::ValidationError;
use crate::pg::GrantProbe;
use crate::validate;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Namespace of entries that do not name one
    pub namespace: String,
    pub resync_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub statement_timeout_secs: u64,
    /// Resources reconciled in parallel within a stage
    pub jobs: usize,
    pub state_dir: Option<String>,
    pub grant_probe: GrantProbe,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            resync_interval_secs: 30,
            connect_timeout_secs: 10,
            statement_timeout_secs: 30,
            jobs: 4,
            state_dir: None,
            grant_probe: GrantProbe::default(),
        }
    }
}

impl Settings {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// One named manifest entry
#[derive(Debug, Clone, Deserialize)]
pub struct Declared<S> {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub spec: S,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "database")]
    pub databases: Vec<Declared<DatabaseSpec>>,
    #[serde(default, rename = "account")]
    pub accounts: Vec<Declared<AccountSpec>>,
    #[serde(default, rename = "grant")]
    pub grants: Vec<Declared<GrantSpec>>,
}

/// A manifest entry that failed validation
#[derive(Debug)]
pub struct Invalid {
    pub kind: ResourceKind,
    pub key: ResourceKey,
    pub error: ValidationError,
}

impl Manifest {
    /// Load a manifest; `.json` files are parsed as JSON, anything else as
    /// TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        };
        manifest.with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content).context("Failed to parse TOML")?;
        manifest.check_names()?;
        Ok(manifest)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(content).context("Failed to parse JSON")?;
        manifest.check_names()?;
        Ok(manifest)
    }

    fn check_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for kind in ResourceKind::ALL {
            for key in self.keys(kind) {
                if key.name.trim().is_empty() || key.namespace.trim().is_empty() {
                    bail!("{kind} entry with empty name or namespace");
                }
                if !seen.insert((kind, key.clone())) {
                    bail!("Duplicate {kind} entry {key}");
                }
            }
        }
        Ok(())
    }

    fn key_of<S>(&self, entry: &Declared<S>) -> ResourceKey {
        let namespace = entry
            .namespace
            .as_deref()
            .unwrap_or(&self.settings.namespace);
        ResourceKey::new(namespace, entry.name.as_str())
    }

    fn find<'a, S>(&self, entries: &'a [Declared<S>], key: &ResourceKey) -> Option<&'a S> {
        entries
            .iter()
            .find(|entry| self.key_of(entry) == *key)
            .map(|entry| &entry.spec)
    }

    pub fn database(&self, key: &ResourceKey) -> Option<&DatabaseSpec> {
        self.find(&self.databases, key)
    }

    pub fn account(&self, key: &ResourceKey) -> Option<&AccountSpec> {
        self.find(&self.accounts, key)
    }

    pub fn grant(&self, key: &ResourceKey) -> Option<&GrantSpec> {
        self.find(&self.grants, key)
    }

    /// Keys of every entry of `kind`, in manifest order
    pub fn keys(&self, kind: ResourceKind) -> Vec<ResourceKey> {
        match kind {
            ResourceKind::Database => self.databases.iter().map(|e| self.key_of(e)).collect(),
            ResourceKind::Account => self.accounts.iter().map(|e| self.key_of(e)).collect(),
            ResourceKind::Grant => self.grants.iter().map(|e| self.key_of(e)).collect(),
        }
    }

    pub fn contains(&self, kind: ResourceKind, key: &ResourceKey) -> bool {
        match kind {
            ResourceKind::Database => self.database(key).is_some(),
            ResourceKind::Account => self.account(key).is_some(),
            ResourceKind::Grant => self.grant(key).is_some(),
        }
    }

    /// Run the validator over every entry
    pub fn invalid_entries(&self) -> Vec<Invalid> {
        let mut invalid = Vec::new();
        let mut check = |kind, key, result: Result<(), ValidationError>| {
            if let Err(error) = result {
                invalid.push(Invalid { kind, key, error });
            }
        };

        for entry in &self.databases {
            check(
                ResourceKind::Database,
                self.key_of(entry),
                validate::validate_database(&entry.spec),
            );
        }
        for entry in &self.accounts {
            check(
                ResourceKind::Account,
                self.key_of(entry),
                validate::validate_account(&entry.spec),
            );
        }
        for entry in &self.grants {
            check(
                ResourceKind::Grant,
                self.key_of(entry),
                validate::validate_grant(&entry.spec),
            );
        }
        invalid
    }

    /// Accounts and grants naming a database resource that is not declared
    pub fn dangling_references(&self) -> Vec<(ResourceKind, ResourceKey, String)> {
        let accounts = self
            .accounts
            .iter()
            .map(|e| (ResourceKind::Account, self.key_of(e), e.spec.database.clone()));
        let grants = self
            .grants
            .iter()
            .map(|e| (ResourceKind::Grant, self.key_of(e), e.spec.database.clone()));

        accounts
            .chain(grants)
            .filter(|(_, key, database)| self.database(&key.sibling(database)).is_none())
            .collect()
    }
}
