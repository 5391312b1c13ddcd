//! Execution planner - builds staged resource execution plans

use crate::resource::{BoxedResource, Resource};

/// An execution plan with resources grouped into ordered stages
///
/// Stages run one after another; resources within a stage are
/// independent of each other and may run in parallel.
pub struct ExecutionPlan {
    /// Resources per stage, lowest stage first
    pub stages: Vec<Vec<BoxedResource>>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a resource to the given stage, creating intermediate stages as needed
    pub fn push(&mut self, stage: usize, resource: BoxedResource) {
        if self.stages.len() <= stage {
            self.stages.resize_with(stage + 1, Vec::new);
        }
        self.stages[stage].push(resource);
    }

    /// All resources in stage order
    pub fn resources(&self) -> impl Iterator<Item = &dyn Resource> {
        self.stages
            .iter()
            .flat_map(|stage| stage.iter().map(|r| &**r))
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        Self {
            stages: self
                .stages
                .into_iter()
                .map(|stage| {
                    stage
                        .into_iter()
                        .filter(|r| predicate(r.as_ref()))
                        .collect()
                })
                .collect(),
        }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.total_resources() == 0
    }
}

impl Default for ExecutionPlan {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a target string like "type.name" into (type, name)
pub fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(resource: &dyn Resource, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // Allow plural aliases ("grants" for "grant")
        let rt = rt.to_ascii_lowercase();
        let rt = rt.strip_suffix('s').unwrap_or(&rt);
        if resource.resource_type() != rt {
            return false;
        }
    }

    name.is_none_or(|n| matches_name(&resource.id(), n))
}

/// `n` names the whole id when it carries a `/`, otherwise the part after it
fn matches_name(id: &str, n: &str) -> bool {
    if n.contains('/') {
        return id == n;
    }
    id.rsplit_once('/').map_or(id, |(_, name)| name) == n
}
