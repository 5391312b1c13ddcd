//! Reconcile outcome to `{ready, error}` status

use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};

/// Status written back for a resource after every reconcile attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStatus {
    pub ready: bool,
    pub error: String,
}

impl ReconcileStatus {
    pub fn ready() -> Self {
        Self {
            ready: true,
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ready: false,
            error: error.into(),
        }
    }
}

pub fn to_status<T>(result: &Result<T, ReconcileError>) -> ReconcileStatus {
    match result {
        Ok(_) => ReconcileStatus::ready(),
        Err(e) => ReconcileStatus::failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_success_is_ready_with_empty_error() {
        let status = to_status::<()>(&Ok(()));
        assert_eq!(status, ReconcileStatus::ready());
        assert!(status.error.is_empty());
    }

    #[test]
    fn test_failure_carries_message() {
        let err: ReconcileError = ValidationError::new("role", "a b", "must match ^[A-Za-z0-9_]+$").into();
        let status = to_status::<()>(&Err(err));
        assert!(!status.ready);
        assert_eq!(status.error, "invalid role \"a b\": must match ^[A-Za-z0-9_]+$");
    }
}
