//! `pgconverge validate`: check the manifest without connecting anywhere

use crate::Context;
use crate::config::Manifest;
use crate::ui;
use anyhow::{Result, bail};

pub fn run(ctx: &Context) -> Result<()> {
    let path = super::manifest_path(&ctx.manifest);
    let manifest = Manifest::load(&path)?;

    ui::header("Validating Manifest");
    ui::kv("Manifest", &path.display().to_string());

    let problems = problems(&manifest);
    for problem in &problems {
        ui::error(problem);
    }
    if !problems.is_empty() {
        bail!("{} problems found in {}", problems.len(), path.display());
    }

    let count = |entries: usize, what: &str| ui::kv(what, &entries.to_string());
    count(manifest.databases.len(), "Databases");
    count(manifest.accounts.len(), "Accounts");
    count(manifest.grants.len(), "Grants");
    println!();
    ui::success("Manifest is valid");
    Ok(())
}

/// Invalid entries, then references to undeclared databases
fn problems(manifest: &Manifest) -> Vec<String> {
    let invalid = manifest
        .invalid_entries()
        .into_iter()
        .map(|i| format!("{} {}: {}", i.kind, i.key, i.error));
    let dangling = manifest
        .dangling_references()
        .into_iter()
        .map(|(kind, key, database)| {
            format!("{kind} {key}: database '{database}' is not declared")
        });
    invalid.chain(dangling).collect()
}
