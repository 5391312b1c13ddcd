//! Error taxonomy for reconciliation
//!
//! Every failure a reconcile cycle can hit is one of five kinds. The
//! controller turns them into a status message; nothing propagates past
//! that boundary.

use crate::api::{ResourceKey, ServerIdentity};
use crate::pg::SqlError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A malformed spec. Retrying without editing the manifest cannot help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} {value}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    /// Offending value, already quoted or redacted for display
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: format!("{value:?}"),
            reason: reason.into(),
        }
    }

    /// Error for a field whose value must not be echoed
    pub fn secret(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: "<redacted>".to_string(),
            reason: reason.into(),
        }
    }
}

/// The server could not be reached, authenticated against, or the
/// connection went away.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("unable to connect to {address} as {user} for database resource {identity}: {source}")]
    Open {
        identity: ServerIdentity,
        address: String,
        user: String,
        #[source]
        source: SqlError,
    },

    #[error("connection to {target} is closed")]
    Closed { target: String },
}

/// An observation or mutation statement failed on the server
#[derive(Debug, Error)]
#[error("error executing query {statement} against {target}: {source}")]
pub struct QueryError {
    /// Statement text, with secrets redacted
    pub statement: String,
    pub target: String,
    #[source]
    pub source: SqlError,
}

impl QueryError {
    pub fn new(statement: impl Into<String>, target: impl Into<String>, source: SqlError) -> Self {
        Self {
            statement: statement.into(),
            target: target.into(),
            source,
        }
    }
}

/// Reading or writing the state file failed
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse state file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize state")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write state file {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Everything a reconcile cycle can fail with
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Connection(#[from] ConnError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// An attribute PostgreSQL cannot alter in place differs
    #[error(
        "database {database} current {attribute} is {observed} but desired {attribute} {desired}, \
         please backup and delete manually the existing database"
    )]
    Irreconcilable {
        database: String,
        attribute: &'static str,
        observed: String,
        desired: String,
    },

    #[error(
        "unable to find a connection for database resource {database}, \
         is there a database resource with that name in ready status?"
    )]
    DependencyNotReady { database: ResourceKey },
}

impl ReconcileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Connection(_) => ErrorCategory::Connection,
            Self::Query(_) => ErrorCategory::Query,
            Self::Irreconcilable { .. } => ErrorCategory::Irreconcilable,
            Self::DependencyNotReady { .. } => ErrorCategory::DependencyNotReady,
        }
    }
}

/// Categories of reconcile errors, for operator feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Connection,
    Query,
    Irreconcilable,
    DependencyNotReady,
}

impl ErrorCategory {
    /// Whether the next resync can fix this without a manifest edit or
    /// operator action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Query | Self::DependencyNotReady
        )
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid resource spec",
            Self::Connection => "Server unreachable",
            Self::Query => "Statement failed",
            Self::Irreconcilable => "Manual intervention required",
            Self::DependencyNotReady => "Database not ready",
        }
    }

    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Validation => "Fix the manifest entry; it will not be retried as is",
            Self::Connection => "Check address and credentials; retried on the next resync",
            Self::Query => "Retried on the next resync",
            Self::Irreconcilable => "Back up, drop and recreate the database by hand",
            Self::DependencyNotReady => "Make the referenced database resource ready first",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irreconcilable_message_asks_for_manual_action() {
        let err = ReconcileError::Irreconcilable {
            database: "app".into(),
            attribute: "encoding",
            observed: "LATIN1".into(),
            desired: "UTF8".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("current encoding is LATIN1 but desired encoding UTF8"));
        assert!(msg.contains("manually"));
        assert!(!err.category().is_retryable());
    }

    #[test]
    fn test_dependency_not_ready_is_retryable() {
        let err = ReconcileError::DependencyNotReady {
            database: ResourceKey::new("default", "main"),
        };
        assert!(err.to_string().contains("default/main"));
        assert!(err.category().is_retryable());
    }

    #[test]
    fn test_validation_error_quotes_value() {
        let err = ValidationError::new("role", "svc;drop", "must match ^[A-Za-z0-9_]+$");
        assert_eq!(
            err.to_string(),
            "invalid role \"svc;drop\": must match ^[A-Za-z0-9_]+$"
        );
        let secret = ValidationError::secret("password", "must not contain NUL");
        assert!(secret.to_string().contains("<redacted>"));
    }
}
