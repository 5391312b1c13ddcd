//! `pgconverge diff`: observe and plan every resource, execute nothing

use crate::Context;
use crate::api::ResourceKind;
use crate::engine::build_plan;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use declarative::{DiffReport, DiffSummary, ResourceDiff, ResourceState, compute_diffs, group_by_type};

pub fn run(ctx: &Context, target: Option<&str>) -> Result<()> {
    super::check_target(target)?;
    let manifest = super::load_manifest(&ctx.manifest)?;
    let controller = super::controller(manifest)?;

    ui::header("Manifest Diff");

    let plan = build_plan(&controller, target);
    let report = compute_diffs(plan.resources());
    controller.engine().registry.close_all();

    print_report(&report);
    Ok(())
}

fn print_report(report: &DiffReport) {
    let groups = group_by_type(&report.diffs);
    for kind in ResourceKind::ALL {
        let Some(diffs) = groups.get(kind.as_str()) else {
            continue;
        };
        ui::section(&format!("{kind} ({})", diffs.len()));
        for diff in diffs {
            println!("  {}", describe(diff));
        }
    }

    if !report.errors.is_empty() {
        ui::section("Could not observe");
        for error in &report.errors {
            println!(
                "  {} {} {}: {}",
                "?".yellow(),
                error.resource_type,
                error.resource_id,
                error.error.dimmed()
            );
        }
    }

    let summary = DiffSummary::from_report(report);
    println!();
    if report.is_clean() {
        ui::success("No changes - current state matches desired state");
        return;
    }
    if summary.has_changes() {
        ui::info(&format!(
            "{} to create, {} to change",
            summary.additions, summary.modifications
        ));
    }
    if summary.errors > 0 {
        ui::warn(&format!("{} resources could not be observed", summary.errors));
    }
}

fn describe(diff: &ResourceDiff) -> String {
    match &diff.current {
        _ if diff.is_addition() => format!("{} {}", "+".green().bold(), diff.description),
        ResourceState::Modified { to, .. } => {
            format!("{} {}: {}", "~".yellow().bold(), diff.description, to)
        }
        ResourceState::Present {
            details: Some(details),
        } => format!("{} {} {}", "…".cyan(), diff.description, format!("({details})").dimmed()),
        _ => format!("{} {}", "~".yellow().bold(), diff.description),
    }
}
