//! Command implementations
//!
//! - `apply` - one reconcile pass over the manifest
//! - `run` - periodic resync until interrupted
//! - `diff` - preview what apply would change
//! - `status` - recorded `{ready, error}` per resource
//! - `validate` - offline manifest checks

pub mod apply;
pub mod diff;
pub mod run;
pub mod status;
pub mod validate;

use crate::api::ResourceKind;
use crate::config::{Manifest, Settings};
use crate::engine::{Controller, Engine, EngineOptions};
use crate::paths;
use crate::pg::{ConnectionRegistry, PgConnector};
use crate::state::StateStore;
use crate::ui;
use anyhow::{Context as _, Result};
use declarative::{ApplyResult, ProgressCallback};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manifest path with `~` and env vars expanded
pub fn manifest_path(path: &Path) -> PathBuf {
    paths::expand(&path.to_string_lossy())
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let path = manifest_path(path);
    log::debug!("Loading manifest from {}", path.display());
    Manifest::load(&path)
}

pub fn open_store(settings: &Settings) -> Result<StateStore> {
    let dir = paths::state_dir(settings.state_dir.as_deref())?;
    StateStore::open(&dir).context("Failed to open state store")
}

/// Wire the registry, the state store and the engines for `manifest`
pub fn controller(manifest: Manifest) -> Result<Arc<Controller>> {
    let settings = &manifest.settings;
    let store = open_store(settings)?;
    let connector = PgConnector {
        connect_timeout: settings.connect_timeout(),
        statement_timeout: settings.statement_timeout(),
    };
    let engine = Engine {
        registry: ConnectionRegistry::new(connector),
        store,
        options: EngineOptions {
            grant_probe: settings.grant_probe,
        },
    };
    Ok(Arc::new(Controller::new(engine, manifest)))
}

/// Reject a `--target` whose kind part names no resource kind
pub fn check_target(target: Option<&str>) -> Result<()> {
    if let Some(t) = target
        && let (Some(kind), _) = declarative::parse_target(t)
    {
        kind.parse::<ResourceKind>().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

/// Section title for an execution stage
fn stage_title(stage: usize) -> &'static str {
    match ResourceKind::ALL.into_iter().find(|kind| kind.stage() == stage) {
        Some(ResourceKind::Database) => "Databases",
        Some(ResourceKind::Account) => "Accounts",
        Some(ResourceKind::Grant) => "Grants",
        None => "Other",
    }
}

/// Prints each stage and resource as the executor reports them
pub struct Printer {
    quiet: bool,
}

impl Printer {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl ProgressCallback for Printer {
    fn on_stage_start(&mut self, stage: usize, count: usize) {
        if !self.quiet {
            ui::section(&format!("{} ({count})", stage_title(stage)));
        }
    }

    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult) {
        if !self.quiet || !result.is_success() {
            ui::result_line(id, result);
        }
    }

    fn on_stage_complete(&mut self, _stage: usize) {}
}
