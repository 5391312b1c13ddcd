//! Observe, diff and converge a set of [`Resource`]s.
//!
//! Resources are pushed into numbered stages of an [`ExecutionPlan`].
//! [`execute`] runs the stages in order and the resources of one stage on
//! a bounded rayon pool, so a stage may rely on everything before it.
//! A failing resource is recorded in the [`ExecuteSummary`] and never stops
//! its siblings. [`compute_diffs`] only observes.
//!
//! ```ignore
//! let mut plan = ExecutionPlan::new();
//! plan.push(0, Box::new(database));
//! plan.push(1, Box::new(account));
//! let summary = execute(&plan, &ExecuteOptions::default(), &mut NoProgress)?;
//! ```
//!
//! Output is left to the caller through [`ProgressCallback`].

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

pub use context::{ApplyContext, NoProgress, ProgressCallback};
pub use diff::{DiffReport, DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use executor::{execute, execute_simple};
pub use planner::{ExecutionPlan, parse_target};
pub use resource::{BoxedResource, Resource};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary, ResourceOutcome, ResourceState};
