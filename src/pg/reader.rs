//! Read-only catalog observation
//!
//! Unquoted identifiers fold to lower case in PostgreSQL, so every lookup
//! lower-cases the name before binding it.

use super::session::Query;
use crate::error::QueryError;
use serde::{Deserialize, Serialize};

pub(crate) const ROLE_EXPIRY: &str = "SELECT CASE WHEN valuntil IS NULL OR valuntil = 'infinity' \
     THEN NULL ELSE to_char(valuntil, 'YYYY-MM-DD') END \
     FROM pg_catalog.pg_user WHERE usename = $1::text";

pub(crate) const DATABASE_CONFIG: &str = "SELECT pg_encoding_to_char(encoding)::text, \
     datcollate::text, datctype::text \
     FROM pg_catalog.pg_database WHERE datname = $1::text";

pub(crate) const SCHEMA_EXISTS: &str =
    "SELECT nspname::text FROM pg_catalog.pg_namespace WHERE nspname = $1::text";

pub(crate) const TABLES_EXIST: &str = "SELECT c.relname::text FROM pg_catalog.pg_class c \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1::text AND c.relkind IN ('r', 'p') LIMIT 1";

pub(crate) const ANY_GRANT: &str = "SELECT table_name::text \
     FROM information_schema.role_table_grants \
     WHERE table_schema::text = $1::text LIMIT 1";

/// Counts tables of the schema on which the grantee lacks at least one of
/// the comma separated privileges.
pub(crate) const TABLES_MISSING_GRANT: &str = "SELECT count(*)::text FROM pg_catalog.pg_class c \
     JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = $1::text AND c.relkind IN ('r', 'p') \
     AND NOT (SELECT bool_and(has_table_privilege($2::text, c.oid, p)) \
     FROM unnest(string_to_array($3::text, ',')) AS p)";

/// How a grant is recognised as already present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantProbe {
    /// Grantee holds every requested privilege on every table of the schema
    #[default]
    Exact,
    /// Any grant row exists for the schema, whoever the grantee
    Coarse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleState {
    /// `YYYY-MM-DD`, `None` when the role never expires
    pub valid_until: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub encoding: String,
    pub collate: String,
    pub ctype: String,
}

/// Issues observation queries on a locked session
pub struct StateReader<'a> {
    conn: &'a mut dyn Query,
    target: &'a str,
}

impl<'a> StateReader<'a> {
    pub fn new(conn: &'a mut dyn Query, target: &'a str) -> Self {
        Self { conn, target }
    }

    /// `None` when the role does not exist
    pub fn read_role_expiry(&mut self, role: &str) -> Result<Option<RoleState>, QueryError> {
        let role = role.to_lowercase();
        let row = self.fetch(ROLE_EXPIRY, &[role.as_str()])?;
        Ok(row.map(|mut columns| RoleState {
            valid_until: columns.first_mut().and_then(Option::take),
        }))
    }

    /// `None` when the database does not exist
    pub fn read_database_config(
        &mut self,
        name: &str,
    ) -> Result<Option<DatabaseConfig>, QueryError> {
        let name = name.to_lowercase();
        let row = self.fetch(DATABASE_CONFIG, &[name.as_str()])?;
        Ok(row.map(|columns| {
            let mut columns = columns.into_iter().map(Option::unwrap_or_default);
            DatabaseConfig {
                encoding: columns.next().unwrap_or_default(),
                collate: columns.next().unwrap_or_default(),
                ctype: columns.next().unwrap_or_default(),
            }
        }))
    }

    pub fn schema_exists(&mut self, schema: &str) -> Result<bool, QueryError> {
        let schema = schema.to_lowercase();
        Ok(self.fetch(SCHEMA_EXISTS, &[schema.as_str()])?.is_some())
    }

    pub fn tables_exist_in(&mut self, schema: &str) -> Result<bool, QueryError> {
        let schema = schema.to_lowercase();
        Ok(self.fetch(TABLES_EXIST, &[schema.as_str()])?.is_some())
    }

    /// Whether the grant needs to be issued, per `probe`
    pub fn grant_exists(
        &mut self,
        probe: GrantProbe,
        schema: &str,
        grantee: &str,
        privileges: &[&str],
    ) -> Result<bool, QueryError> {
        let schema = schema.to_lowercase();
        match probe {
            GrantProbe::Coarse => Ok(self.fetch(ANY_GRANT, &[schema.as_str()])?.is_some()),
            GrantProbe::Exact => {
                let grantee = grantee.to_lowercase();
                let wanted = privileges.join(",");
                let missing = self
                    .fetch(
                        TABLES_MISSING_GRANT,
                        &[schema.as_str(), grantee.as_str(), wanted.as_str()],
                    )?
                    .and_then(|mut columns| columns.first_mut().and_then(Option::take))
                    .unwrap_or_default();
                Ok(missing == "0")
            }
        }
    }

    fn fetch(
        &mut self,
        sql: &'static str,
        params: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, QueryError> {
        let row = self
            .conn
            .query_opt(sql, params)
            .map_err(|e| QueryError::new(first_line(sql), self.target, e))?;
        log::debug!("{} {:?} on {}: {:?}", first_line(sql), params, self.target, row);
        Ok(row)
    }
}

/// Short form of a query for diagnostics
fn first_line(sql: &str) -> &str {
    sql.split(" WHERE ").next().unwrap_or(sql)
}
