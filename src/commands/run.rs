//! `pgconverge run`: resync every declared resource periodically
//!
//! The manifest is re-read before each pass, so edits take effect on the
//! next tick. A manifest that fails to load keeps the previous one active.

use crate::Context;
use crate::config::Manifest;
use crate::engine::{Controller, build_plan};
use crate::ui;
use anyhow::Result;
use declarative::{ApplyResult, ExecuteOptions, ExecuteSummary, NoProgress, execute};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub fn run(ctx: &Context, interval: Option<u64>, jobs: Option<usize>) -> Result<()> {
    let path = super::manifest_path(&ctx.manifest);
    let manifest = Manifest::load(&path)?;
    let controller = super::controller(manifest)?;

    if !ctx.quiet {
        ui::info(&format!("Reconciling {} until interrupted", path.display()));
    }

    loop {
        let settings = controller.manifest().settings.clone();
        pass(&controller, jobs.unwrap_or(settings.jobs));

        let pause = interval
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or_else(|| settings.resync_interval());
        log::debug!("Next resync in {}s", pause.as_secs());
        thread::sleep(pause);

        reload(&controller, &path);
    }
}

/// One reconcile pass over the current manifest
fn pass(controller: &Arc<Controller>, jobs: usize) -> Option<ExecuteSummary> {
    let plan = build_plan(controller, None);
    let opts = ExecuteOptions {
        jobs,
        ..ExecuteOptions::default()
    };

    match execute(&plan, &opts, &mut NoProgress) {
        Ok(summary) => {
            for failure in summary.failures() {
                if let ApplyResult::Failed { error } = &failure.result {
                    log::warn!("{} {} failed: {error}", failure.resource_type, failure.id);
                }
            }
            log::info!(
                "Resync pass: {} created, {} modified, {} deferred, {} unchanged, {} failed",
                summary.created,
                summary.modified,
                summary.deferred,
                summary.no_change,
                summary.failed
            );
            Some(summary)
        }
        Err(e) => {
            log::error!("Resync pass failed: {e:#}");
            None
        }
    }
}

/// Swap in the manifest on disk; keep the current one when it does not load
fn reload(controller: &Controller, path: &Path) -> bool {
    match Manifest::load(path) {
        Ok(manifest) => {
            controller.replace_manifest(manifest);
            true
        }
        Err(e) => {
            log::error!("Keeping the previous manifest: {e:#}");
            false
        }
    }
}
