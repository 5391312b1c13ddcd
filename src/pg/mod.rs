//! PostgreSQL plumbing: sessions, the connection registry, catalog reads
//! and statement builders.

#[cfg(test)]
pub mod fake;
pub mod reader;
pub mod registry;
pub mod session;
pub mod sql;

pub use reader::{DatabaseConfig, GrantProbe, RoleState, StateReader};
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use session::{ConnectParams, Connector, PgConnector, Query, Session, SqlError};
pub use sql::Statement;
