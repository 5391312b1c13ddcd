//! Side-effect free comparison of observed and desired state

use crate::resource::Resource;
use crate::types::ResourceState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One resource whose observed state differs from the desired one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub resource_type: String,
    pub description: String,
    pub current: ResourceState,
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// `None` when the resource is already converged
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        let current = resource.current_state()?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        }))
    }

    /// Absent now, present once applied
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }
}

/// A resource whose current state could not be observed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffError {
    pub resource_id: String,
    pub resource_type: String,
    pub error: String,
}

/// Diffs plus observation failures for a set of resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffReport {
    pub diffs: Vec<ResourceDiff>,
    pub errors: Vec<DiffError>,
}

impl DiffReport {
    /// Nothing to change and every resource observed
    pub fn is_clean(&self) -> bool {
        self.diffs.is_empty() && self.errors.is_empty()
    }
}

/// Compute diffs for a list of resources, in order
///
/// Resources are observed sequentially so that earlier resources can
/// establish what later ones depend on.
pub fn compute_diffs<'a>(resources: impl IntoIterator<Item = &'a dyn Resource>) -> DiffReport {
    let mut report = DiffReport::default();
    for resource in resources {
        match ResourceDiff::from_resource(resource) {
            Ok(Some(diff)) => report.diffs.push(diff),
            Ok(None) => {}
            Err(e) => report.errors.push(DiffError {
                resource_id: resource.id(),
                resource_type: resource.resource_type().to_string(),
                error: format!("{e:#}"),
            }),
        }
    }
    report
}

/// Counts for the closing line of a diff
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    pub additions: usize,
    pub modifications: usize,
    pub errors: usize,
}

impl DiffSummary {
    pub fn from_report(report: &DiffReport) -> Self {
        let mut summary = Self {
            errors: report.errors.len(),
            ..Self::default()
        };
        for diff in &report.diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.additions + self.modifications
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Diffs keyed by `resource_type`
pub fn group_by_type(diffs: &[ResourceDiff]) -> HashMap<String, Vec<&ResourceDiff>> {
    let mut groups: HashMap<String, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}
