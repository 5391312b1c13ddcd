//! Execution engine - applies staged resources with a bounded worker pool

use crate::context::{ApplyContext, NoProgress, ProgressCallback};
use crate::planner::ExecutionPlan;
use crate::resource::{BoxedResource, Resource};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceOutcome};
use anyhow::Result;
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// Execute a plan with the given options and progress callback
///
/// Stages run in order. Within a stage, resources run on a pool of
/// `opts.jobs` threads. A failing resource never stops the others; its
/// error is recorded as [`ApplyResult::Failed`].
pub fn execute<P>(
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
{
    let mut summary = ExecuteSummary::default();
    if plan.is_empty() {
        return Ok(summary);
    }

    let ctx = ApplyContext::new(opts.dry_run);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    for (index, stage) in plan.stages.iter().enumerate() {
        if stage.is_empty() {
            continue;
        }

        progress.on_stage_start(index, stage.len());
        let outcomes = if opts.jobs <= 1 || stage.len() == 1 {
            stage
                .iter()
                .map(|resource| apply_resource(resource.as_ref(), &ctx))
                .collect()
        } else {
            execute_parallel(&pool, stage, &ctx)?
        };

        for outcome in outcomes {
            progress.on_resource_complete(&outcome.id, &outcome.result);
            summary.add_outcome(outcome);
        }
        progress.on_stage_complete(index);
    }

    Ok(summary)
}

/// Execute the resources of one stage in parallel using rayon
fn execute_parallel(
    pool: &rayon::ThreadPool,
    resources: &[BoxedResource],
    ctx: &ApplyContext,
) -> Result<Vec<ResourceOutcome>> {
    // Progress callbacks are not thread-safe; collect first, report after.
    let results: Arc<Mutex<Vec<ResourceOutcome>>> =
        Arc::new(Mutex::new(Vec::with_capacity(resources.len())));

    pool.install(|| {
        resources.par_iter().for_each(|resource| {
            let outcome = apply_resource(resource.as_ref(), ctx);
            push_outcome(&results, outcome);
        });
    });

    into_outcomes(results)
}

fn push_outcome(results: &Arc<Mutex<Vec<ResourceOutcome>>>, outcome: ResourceOutcome) {
    match results.lock() {
        Ok(mut locked) => locked.push(outcome),
        Err(poisoned) => poisoned.into_inner().push(outcome),
    }
}

fn into_outcomes(results: Arc<Mutex<Vec<ResourceOutcome>>>) -> Result<Vec<ResourceOutcome>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Apply a single resource
fn apply_resource(resource: &dyn Resource, ctx: &ApplyContext) -> ResourceOutcome {
    let result = match resource.apply(ctx) {
        Ok(result) => result,
        Err(e) => ApplyResult::Failed {
            error: format!("{e:#}"),
        },
    };

    ResourceOutcome {
        id: resource.id(),
        resource_type: resource.resource_type().to_string(),
        result,
    }
}

/// Simple execution without callbacks
pub fn execute_simple(plan: &ExecutionPlan, opts: &ExecuteOptions) -> Result<ExecuteSummary> {
    execute(plan, opts, &mut NoProgress)
}
