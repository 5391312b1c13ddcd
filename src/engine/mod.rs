//! Convergence engines
//!
//! Every kind runs the same cycle: validate, get a connection, observe,
//! plan, execute. Kinds only differ in those steps, which they supply
//! through [`Converge`]; [`converge`] drives the cycle.

mod account;
mod controller;
mod database;
mod grant;
mod plan;
mod resource;

pub use account::AccountEngine;
pub use controller::Controller;
pub use database::DatabaseEngine;
pub use grant::{GrantEngine, GrantObservation};
pub use plan::{Outcome, Plan};
pub use resource::{ManagedResource, build_plan};

use crate::api::{ResourceKey, ResourceKind};
use crate::error::{QueryError, ReconcileError, ValidationError};
use crate::pg::{ConnectionHandle, ConnectionRegistry, GrantProbe, Query, StateReader};
use crate::state::{AppliedRecord, Fingerprint, StateStore};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    pub grant_probe: GrantProbe,
}

/// Shared state every reconcile uses
pub struct Engine {
    pub registry: ConnectionRegistry,
    pub store: StateStore,
    pub options: EngineOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    /// Observe and plan only
    Preview,
}

/// The kind-specific steps of a reconcile cycle
pub trait Converge {
    const KIND: ResourceKind;

    type Spec: Serialize;
    type Observed: fmt::Debug;

    fn validate(spec: &Self::Spec) -> Result<(), ValidationError>;

    fn connect(
        registry: &ConnectionRegistry,
        key: &ResourceKey,
        spec: &Self::Spec,
    ) -> Result<ConnectionHandle, ReconcileError>;

    fn observe(
        reader: &mut StateReader<'_>,
        spec: &Self::Spec,
        options: &EngineOptions,
    ) -> Result<Self::Observed, ReconcileError>;

    fn plan(
        spec: &Self::Spec,
        observed: &Self::Observed,
        desired: &Fingerprint,
        last: Option<&AppliedRecord>,
    ) -> Result<Plan, ReconcileError>;

    /// Value that cannot be observed on the server and is diffed against
    /// the last applied record instead
    fn secret(_spec: &Self::Spec) -> Option<&str> {
        None
    }
}

/// Run one cycle for `spec`. In [`Mode::Apply`] the planned statements are
/// executed one round-trip each, stopping at the first failure; the applied
/// record is only updated when all of them succeeded.
pub fn converge<E: Converge>(
    engine: &Engine,
    key: &ResourceKey,
    spec: &E::Spec,
    mode: Mode,
) -> Result<Plan, ReconcileError> {
    E::validate(spec)?;
    let handle = E::connect(&engine.registry, key, spec)?;
    let mut session = handle.lock()?;

    let observed = E::observe(
        &mut StateReader::new(&mut session, handle.target()),
        spec,
        &engine.options,
    )?;
    log::debug!("Observed {} {key}: {observed:?}", E::KIND);

    let desired = Fingerprint::new(E::KIND, key, spec, E::secret(spec));
    let last = engine.store.applied(E::KIND, key);
    let plan = E::plan(spec, &observed, &desired, last.as_ref())?;
    if mode == Mode::Preview {
        return Ok(plan);
    }

    for statement in &plan.statements {
        log::info!("Executing on {}: {statement}", handle.target());
        session
            .execute(statement.sql())
            .map_err(|e| QueryError::new(statement.display(), handle.target(), e))?;
    }

    if (!plan.statements.is_empty() || last.is_none())
        && let Err(e) = engine.store.record_applied(E::KIND, key, desired)
    {
        log::warn!("Failed to record applied state for {} {key}: {e}", E::KIND);
    }
    Ok(plan)
}
