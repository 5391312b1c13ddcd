//! Reconcile entry point: spec lookup, dispatch by kind, status write-back

use super::{AccountEngine, DatabaseEngine, Engine, GrantEngine, Mode, Plan, converge};
use crate::api::{ResourceKey, ResourceKind};
use crate::config::Manifest;
use crate::error::ReconcileError;
use crate::report;
use declarative::ApplyResult;
use std::sync::{Arc, PoisonError, RwLock};

pub struct Controller {
    engine: Engine,
    manifest: RwLock<Arc<Manifest>>,
}

impl Controller {
    pub fn new(engine: Engine, manifest: Manifest) -> Self {
        Self {
            engine,
            manifest: RwLock::new(Arc::new(manifest)),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Snapshot of the current desired state
    pub fn manifest(&self) -> Arc<Manifest> {
        let guard = self.manifest.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a reloaded manifest. Database resources that disappeared
    /// lose their connections; removed resources lose their records.
    pub fn replace_manifest(&self, manifest: Manifest) {
        let previous = {
            let mut guard = self.manifest.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, Arc::new(manifest))
        };
        let current = self.manifest();

        for kind in ResourceKind::ALL {
            for key in previous.keys(kind) {
                if current.contains(kind, &key) {
                    continue;
                }
                log::info!("{kind} {key} was removed from the manifest");
                if kind == ResourceKind::Database {
                    self.engine.registry.evict(&key);
                }
                if let Err(e) = self.engine.store.forget(kind, &key) {
                    log::warn!("Failed to drop records of {kind} {key}: {e}");
                }
            }
        }
    }

    /// Re-read the spec of `key` and converge it. The outcome is reported as
    /// a `{ready, error}` status exactly once; dry runs do not persist it.
    pub fn reconcile(&self, kind: ResourceKind, key: &ResourceKey, dry_run: bool) -> ApplyResult {
        let mode = if dry_run { Mode::Preview } else { Mode::Apply };
        let Some(result) = self.run(kind, key, mode) else {
            log::debug!("{kind} {key} is not declared, skipping");
            return ApplyResult::Skipped {
                reason: "not declared in the manifest".to_string(),
            };
        };

        let status = report::to_status(&result);
        if !dry_run
            && let Err(e) = self.engine.store.record_status(kind, key, &status)
        {
            log::warn!("Failed to record status of {kind} {key}: {e}");
        }
        log::info!(
            "Reconciled kind={kind} key={key} ready={} error={:?}",
            status.ready,
            status.error
        );
        if let Err(e) = &result {
            let category = e.category();
            if category.is_retryable() {
                log::debug!("{kind} {key}: {category}. {}", category.advice());
            } else {
                log::warn!("{kind} {key}: {category}. {}", category.advice());
            }
        }

        match result {
            Ok(plan) if dry_run => plan.previewed(),
            Ok(plan) => plan.applied(),
            Err(e) => ApplyResult::Failed {
                error: e.to_string(),
            },
        }
    }

    /// Observe and plan without executing anything
    pub fn preview(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
    ) -> Option<Result<Plan, ReconcileError>> {
        self.run(kind, key, Mode::Preview)
    }

    fn run(
        &self,
        kind: ResourceKind,
        key: &ResourceKey,
        mode: Mode,
    ) -> Option<Result<Plan, ReconcileError>> {
        let manifest = self.manifest();
        let engine = &self.engine;
        match kind {
            ResourceKind::Database => manifest
                .database(key)
                .map(|spec| converge::<DatabaseEngine>(engine, key, spec, mode)),
            ResourceKind::Account => manifest
                .account(key)
                .map(|spec| converge::<AccountEngine>(engine, key, spec, mode)),
            ResourceKind::Grant => manifest
                .grant(key)
                .map(|spec| converge::<GrantEngine>(engine, key, spec, mode)),
        }
    }
}
