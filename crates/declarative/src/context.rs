//! What the executor hands to resources and reports back to the caller

use crate::types::ApplyResult;

/// Receives stage and resource events in execution order
pub trait ProgressCallback: Send {
    fn on_stage_start(&mut self, stage: usize, count: usize);

    /// Called once per resource, after its whole stage finished
    fn on_resource_complete(&mut self, id: &str, result: &ApplyResult);

    fn on_stage_complete(&mut self, stage: usize);
}

/// Reports nothing
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_stage_start(&mut self, _stage: usize, _count: usize) {}
    fn on_resource_complete(&mut self, _id: &str, _result: &ApplyResult) {}
    fn on_stage_complete(&mut self, _stage: usize) {}
}

/// Passed to every `Resource::apply`
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyContext {
    /// Plan and report, change nothing
    pub dry_run: bool,
}

impl ApplyContext {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}
