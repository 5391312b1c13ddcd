//! What one reconcile cycle decided to do

use crate::pg::Statement;
use declarative::{ApplyResult, ResourceState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoChange,
    Create,
    Alter,
    /// A precondition outside our control is missing; the next resync
    /// finishes the work
    Deferred { reason: String },
}

/// Mutating statements to run, in order, and what they amount to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub statements: Vec<Statement>,
    pub outcome: Outcome,
}

impl Plan {
    pub fn no_change() -> Self {
        Self {
            statements: Vec::new(),
            outcome: Outcome::NoChange,
        }
    }

    pub fn create(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
            outcome: Outcome::Create,
        }
    }

    pub fn alter(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
            outcome: Outcome::Alter,
        }
    }

    /// Redacted statements joined for display
    pub fn summary(&self) -> String {
        self.statements
            .iter()
            .map(Statement::display)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Result of a plan that was executed
    pub fn applied(&self) -> ApplyResult {
        match &self.outcome {
            Outcome::NoChange => ApplyResult::NoChange,
            Outcome::Create => ApplyResult::Created,
            Outcome::Alter => ApplyResult::Modified,
            Outcome::Deferred { reason } => ApplyResult::Deferred {
                reason: reason.clone(),
            },
        }
    }

    /// Result of a plan that was only computed
    pub fn previewed(&self) -> ApplyResult {
        match &self.outcome {
            Outcome::NoChange => ApplyResult::NoChange,
            Outcome::Deferred { reason } if self.statements.is_empty() => ApplyResult::Deferred {
                reason: reason.clone(),
            },
            _ => ApplyResult::Skipped {
                reason: format!("dry run, would execute: {}", self.summary()),
            },
        }
    }

    /// Observed state as seen through this plan
    pub fn current_state(&self) -> ResourceState {
        match &self.outcome {
            Outcome::NoChange => ResourceState::Present { details: None },
            Outcome::Create => ResourceState::Absent,
            Outcome::Alter => ResourceState::Modified {
                from: "drifted".to_string(),
                to: self.summary(),
            },
            Outcome::Deferred { reason } => ResourceState::Present {
                details: Some(if self.statements.is_empty() {
                    reason.clone()
                } else {
                    format!("{reason}; would execute: {}", self.summary())
                }),
            },
        }
    }
}
