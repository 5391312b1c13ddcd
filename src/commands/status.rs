//! `pgconverge status`: last recorded status of every resource, offline

use crate::Context;
use crate::api::ResourceKind;
use crate::state::{StateStore, StatusRecord};
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;

pub fn run(ctx: &Context) -> Result<()> {
    let manifest = super::load_manifest(&ctx.manifest)?;
    let store = super::open_store(&manifest.settings)?;

    ui::header("Reconcile Status");
    if let Some(path) = store.path() {
        ui::kv("State", &path.display().to_string());
    }

    let mut declared = HashSet::new();
    let mut failing = 0;
    for kind in ResourceKind::ALL {
        let keys = manifest.keys(kind);
        if keys.is_empty() {
            continue;
        }
        ui::section(&format!("{kind} ({})", keys.len()));
        for key in keys {
            let record = store.status(kind, &key);
            if record.as_ref().is_some_and(|r| !r.ready) {
                failing += 1;
            }
            println!("  {}", line(&key.to_string(), record.as_ref()));
            declared.insert(format!("{kind}/{key}"));
        }
    }

    let stale = stale_records(&store, &declared);
    if !stale.is_empty() {
        ui::section("Not in the manifest");
        for id in stale {
            ui::dim(&id);
        }
    }

    println!();
    if failing > 0 {
        ui::warn(&format!("{failing} resources are not ready"));
    } else {
        ui::success("No failing resources");
    }
    Ok(())
}

fn line(id: &str, record: Option<&StatusRecord>) -> String {
    match record {
        None => format!("{} {} {}", "?".dimmed(), id, "never reconciled".dimmed()),
        Some(r) if r.ready => format!(
            "{} {} {}",
            "✓".green(),
            id,
            r.updated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
        ),
        Some(r) => format!("{} {}: {}", "✗".red(), id, r.error.red()),
    }
}

/// Recorded statuses whose resource is no longer declared
fn stale_records(store: &StateStore, declared: &HashSet<String>) -> Vec<String> {
    store
        .statuses()
        .into_iter()
        .map(|(id, _)| id)
        .filter(|id| !declared.contains(id))
        .collect()
}
