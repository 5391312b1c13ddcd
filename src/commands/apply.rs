//! `pgconverge apply`

use super::Printer;
use crate::Context;
use crate::engine::build_plan;
use crate::ui;
use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{ExecuteOptions, ExecuteSummary, execute};

pub fn run(ctx: &Context, target: Option<&str>, dry_run: bool, jobs: Option<usize>) -> Result<()> {
    super::check_target(target)?;
    let manifest = super::load_manifest(&ctx.manifest)?;
    let jobs = jobs.unwrap_or(manifest.settings.jobs);
    let controller = super::controller(manifest)?;

    if !ctx.quiet {
        ui::header("Applying Manifest");
    }
    if dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let plan = build_plan(&controller, target);
    if plan.is_empty() {
        match target {
            Some(t) => ui::warn(&format!("Nothing in the manifest matches '{t}'")),
            None => ui::info("The manifest declares no resources"),
        }
        return Ok(());
    }

    let opts = ExecuteOptions { dry_run, jobs };
    let summary = execute(&plan, &opts, &mut Printer::new(ctx.quiet));
    controller.engine().registry.close_all();
    let summary = summary?;

    print_summary(&summary, dry_run);
    if !summary.is_success() {
        bail!("{} of {} resources failed", summary.failed, summary.total());
    }
    Ok(())
}

fn print_summary(summary: &ExecuteSummary, dry_run: bool) {
    println!();
    if !summary.is_success() {
        println!("  {} Manifest applied with errors", "⚠".yellow().bold());
    } else if dry_run {
        println!("  {} Dry run complete", "✓".green().bold());
    } else {
        println!("  {} Manifest applied successfully!", "✓".green().bold());
    }

    for (count, what) in [
        (summary.created, "created"),
        (summary.modified, "modified"),
        (summary.deferred, "deferred"),
        (summary.skipped, "skipped"),
        (summary.no_change, "unchanged"),
    ] {
        if count > 0 {
            println!("    • {count} resources {what}");
        }
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}
