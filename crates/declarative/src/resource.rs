//! The unit the planner and executor work with
//!
//! Observation (`current_state`) is kept apart from convergence (`apply`)
//! so `diff` can run every observation without side effects.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;
use std::fmt;

/// Something with an observable state and a way to converge it
///
/// ```ignore
/// #[derive(Debug)]
/// struct Schema(String);
///
/// impl Resource for Schema {
///     fn id(&self) -> String { self.0.clone() }
///     fn description(&self) -> String { format!("schema {}", self.0) }
///     fn resource_type(&self) -> &'static str { "schema" }
///     fn current_state(&self) -> Result<ResourceState> { Ok(ResourceState::Absent) }
///     fn desired_state(&self) -> ResourceState { ResourceState::Present { details: None } }
///     fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
///         if ctx.dry_run {
///             return Ok(ApplyResult::Skipped { reason: "dry run".into() });
///         }
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Stable identifier, unique within the resource type
    /// (e.g. "default/main" for a database)
    fn id(&self) -> String;

    /// One-line label for output
    fn description(&self) -> String;

    /// Grouping and filtering key: "database", "account", "grant"
    fn resource_type(&self) -> &'static str;

    /// Observe the current state. Must not change anything.
    fn current_state(&self) -> Result<ResourceState>;

    /// The state `apply` converges to
    fn desired_state(&self) -> ResourceState;

    /// Converge to the desired state. Returns `NoChange` when nothing had
    /// to be done; with `ctx.dry_run` nothing may be changed.
    fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
