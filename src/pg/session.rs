//! Session traits and the `postgres` backed implementation

use postgres::types::ToSql;
use postgres::{Client, NoTls};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Driver-level failure
#[derive(Debug, Error)]
pub enum SqlError {
    #[error(transparent)]
    Postgres(#[from] postgres::Error),

    #[error("invalid address {0}, expected host:port")]
    InvalidAddress(String),

    #[error("connection is closed")]
    Closed,

    #[cfg(test)]
    #[error("{0}")]
    Rejected(String),
}

/// The two round-trips engines need
pub trait Query {
    /// Run a catalog read whose columns are all text. Every value is bound
    /// as a text parameter.
    fn query_opt(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SqlError>;

    /// Run a utility statement over the simple query protocol
    fn execute(&mut self, sql: &str) -> Result<(), SqlError>;
}

/// An open connection to one database
pub trait Session: Query + Send {
    fn close(self: Box<Self>) -> Result<(), SqlError>;
}

/// Opens sessions; the registry owns one of these
pub trait Connector: Send + Sync {
    fn connect(&self, params: &ConnectParams, database: &str)
    -> Result<Box<dyn Session>, SqlError>;
}

/// Everything needed to open a connection for a database resource
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub address: String,
    pub user: String,
    pub password: String,
    /// Managed database, used by the scoped connection
    pub database: String,
    /// Database the server connection opens into
    pub maintenance_database: String,
}

impl ConnectParams {
    /// Whether an open connection can be reused for `other`
    pub fn same_credentials(&self, other: &Self) -> bool {
        self.address == other.address && self.user == other.user && self.password == other.password
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("maintenance_database", &self.maintenance_database)
            .finish()
    }
}

/// Connects with the synchronous `postgres` client, without TLS
#[derive(Debug, Clone)]
pub struct PgConnector {
    pub connect_timeout: Duration,
    /// Server-side bound on every statement
    pub statement_timeout: Duration,
}

impl Connector for PgConnector {
    fn connect(
        &self,
        params: &ConnectParams,
        database: &str,
    ) -> Result<Box<dyn Session>, SqlError> {
        let (host, port) = params
            .address
            .rsplit_once(':')
            .ok_or_else(|| SqlError::InvalidAddress(params.address.clone()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| SqlError::InvalidAddress(params.address.clone()))?;

        let client = postgres::Config::new()
            .host(host)
            .port(port)
            .user(&params.user)
            .password(&params.password)
            .dbname(database)
            .application_name(env!("CARGO_PKG_NAME"))
            .connect_timeout(self.connect_timeout)
            .options(&format!(
                "-c statement_timeout={}",
                self.statement_timeout.as_millis()
            ))
            .connect(NoTls)?;

        log::debug!("Connected to {}/{} as {}", params.address, database, params.user);
        Ok(Box::new(PgSession { client }))
    }
}

pub struct PgSession {
    client: Client,
}

impl Query for PgSession {
    fn query_opt(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SqlError> {
        let params: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let Some(row) = self.client.query_opt(sql, &params)? else {
            return Ok(None);
        };
        let columns = (0..row.len())
            .map(|i| row.try_get::<_, Option<String>>(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(columns))
    }

    fn execute(&mut self, sql: &str) -> Result<(), SqlError> {
        self.client.batch_execute(sql)?;
        Ok(())
    }
}

impl Session for PgSession {
    fn close(self: Box<Self>) -> Result<(), SqlError> {
        self.client.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(password: &str) -> ConnectParams {
        ConnectParams {
            address: "db.internal:5432".into(),
            user: "admin".into(),
            password: password.into(),
            database: "app".into(),
            maintenance_database: "postgres".into(),
        }
    }

    #[test]
    fn test_same_credentials_ignores_databases() {
        let a = params("one");
        let mut b = params("one");
        b.database = "other".into();
        b.maintenance_database = "template1".into();
        assert!(a.same_credentials(&b));
        assert!(!a.same_credentials(&params("two")));
    }

    #[test]
    fn test_debug_redacts_password() {
        assert!(!format!("{:?}", params("hunter2")).contains("hunter2"));
    }

    #[test]
    fn test_connect_rejects_malformed_address() {
        let connector = PgConnector {
            connect_timeout: Duration::from_millis(10),
            statement_timeout: Duration::from_millis(10),
        };
        let mut bad = params("x");
        bad.address = "db.internal:http".into();
        assert!(matches!(
            connector.connect(&bad, "postgres"),
            Err(SqlError::InvalidAddress(_))
        ));
    }
}
