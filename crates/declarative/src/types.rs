//! States, results and summaries shared by the planner and executor

use serde::{Deserialize, Serialize};

/// Observed or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    Present { details: Option<String> },
    Absent,
    /// Exists but drifted; `to` names the pending change
    Modified { from: String, to: String },
    /// Not observable right now
    Unknown,
}

/// What `apply` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    NoChange,
    Created,
    Modified,
    /// A precondition is not met yet; a later pass will finish the work
    Deferred { reason: String },
    Failed { error: String },
    Skipped { reason: String },
}

impl ApplyResult {
    /// Anything but `Failed`
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// `Created` or `Modified`
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

/// Result of one resource within an execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOutcome {
    pub id: String,
    pub resource_type: String,
    pub result: ApplyResult,
}

/// Counts per result kind plus every outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
    /// Per-resource results in completion order
    #[serde(default)]
    pub outcomes: Vec<ResourceOutcome>,
}

impl ExecuteSummary {
    /// Created plus modified
    pub fn total_changes(&self) -> usize {
        self.created + self.modified
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.created + self.modified + self.deferred + self.skipped + self.failed + self.no_change
    }

    fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Deferred { .. } => self.deferred += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn add_outcome(&mut self, outcome: ResourceOutcome) {
        self.add_result(&outcome.result);
        self.outcomes.push(outcome);
    }

    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|o| !o.result.is_success())
    }
}

/// Knobs for [`crate::execute`]
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Passed to each resource as `ApplyContext::dry_run`
    pub dry_run: bool,
    /// Worker threads per stage
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}
