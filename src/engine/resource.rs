//! Manifest entries as `declarative` resources

use super::Controller;
use crate::api::{ResourceKey, ResourceKind};
use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, ExecutionPlan, Resource, ResourceState};
use std::fmt;
use std::sync::Arc;

pub struct ManagedResource {
    controller: Arc<Controller>,
    kind: ResourceKind,
    key: ResourceKey,
}

impl ManagedResource {
    pub fn new(controller: Arc<Controller>, kind: ResourceKind, key: ResourceKey) -> Self {
        Self {
            controller,
            kind,
            key,
        }
    }
}

impl fmt::Debug for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedResource")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .finish()
    }
}

impl Resource for ManagedResource {
    fn id(&self) -> String {
        self.key.to_string()
    }

    fn description(&self) -> String {
        format!("{} {}", self.kind, self.key)
    }

    fn resource_type(&self) -> &'static str {
        self.kind.as_str()
    }

    fn current_state(&self) -> Result<ResourceState> {
        match self.controller.preview(self.kind, &self.key) {
            None => Ok(ResourceState::Unknown),
            Some(Ok(plan)) => Ok(plan.current_state()),
            Some(Err(e)) => Err(e.into()),
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<ApplyResult> {
        Ok(self.controller.reconcile(self.kind, &self.key, ctx.dry_run))
    }
}

/// One resource per manifest entry, staged databases, accounts, grants.
/// `target` narrows the plan to `kind` or `kind.name`.
pub fn build_plan(controller: &Arc<Controller>, target: Option<&str>) -> ExecutionPlan {
    let manifest = controller.manifest();
    let mut plan = ExecutionPlan::new();
    for kind in ResourceKind::ALL {
        for key in manifest.keys(kind) {
            plan.push(
                kind.stage(),
                Box::new(ManagedResource::new(Arc::clone(controller), kind, key)),
            );
        }
    }
    plan.filter_by_target(target)
}
