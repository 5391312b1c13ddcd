//! In-memory PostgreSQL double for tests
//!
//! Understands exactly the catalog reads in [`super::reader`] and the
//! statements built by [`super::sql`], and records everything executed.

use super::reader::{
    ANY_GRANT, DATABASE_CONFIG, ROLE_EXPIRY, SCHEMA_EXISTS, TABLES_EXIST, TABLES_MISSING_GRANT,
};
use super::session::{ConnectParams, Connector, Query, Session, SqlError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const ALL_PRIVILEGES: [&str; 7] = [
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "TRUNCATE",
    "REFERENCES",
    "TRIGGER",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRecord {
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Default)]
struct Catalog {
    roles: BTreeMap<String, Option<String>>,
    /// name -> (encoding, collate, ctype)
    databases: BTreeMap<String, (String, String, String)>,
    /// (database, schema)
    schemas: BTreeSet<(String, String)>,
    /// (database, schema, table)
    tables: BTreeSet<(String, String, String)>,
    /// (database, schema, table, grantee, privilege)
    grants: BTreeSet<(String, String, String, String, String)>,
    executed: Vec<(String, String)>,
    connects: Vec<ConnectRecord>,
    closes: usize,
    connect_failure: Option<String>,
    query_failure: Option<String>,
    execute_failure: Option<String>,
}

/// Shared handle on one fake server
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    catalog: Arc<Mutex<Catalog>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_role(&self, role: &str, valid_until: Option<&str>) {
        self.catalog()
            .roles
            .insert(role.to_lowercase(), valid_until.map(str::to_string));
    }

    pub fn role_expiry(&self, role: &str) -> Option<Option<String>> {
        self.catalog().roles.get(role).cloned()
    }

    pub fn add_database(&self, name: &str, encoding: &str, collate: &str, ctype: &str) {
        self.catalog().databases.insert(
            name.to_lowercase(),
            (encoding.into(), collate.into(), ctype.into()),
        );
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.catalog().databases.contains_key(name)
    }

    pub fn add_schema(&self, database: &str, schema: &str) {
        self.catalog()
            .schemas
            .insert((database.into(), schema.to_lowercase()));
    }

    pub fn has_schema(&self, database: &str, schema: &str) -> bool {
        self.catalog()
            .schemas
            .contains(&(database.to_string(), schema.to_string()))
    }

    pub fn add_table(&self, database: &str, schema: &str, table: &str) {
        let mut catalog = self.catalog();
        catalog.schemas.insert((database.into(), schema.into()));
        catalog
            .tables
            .insert((database.into(), schema.into(), table.into()));
    }

    pub fn add_grant(&self, database: &str, schema: &str, table: &str, grantee: &str, privilege: &str) {
        self.catalog().grants.insert((
            database.into(),
            schema.into(),
            table.into(),
            grantee.into(),
            privilege.into(),
        ));
    }

    pub fn fail_connect(&self, message: &str) {
        self.catalog().connect_failure = Some(message.into());
    }

    pub fn fail_queries(&self, message: &str) {
        self.catalog().query_failure = Some(message.into());
    }

    pub fn fail_execute(&self, message: &str) {
        self.catalog().execute_failure = Some(message.into());
    }

    pub fn recover(&self) {
        let mut catalog = self.catalog();
        catalog.connect_failure = None;
        catalog.query_failure = None;
        catalog.execute_failure = None;
    }

    /// SQL of every statement executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.catalog()
            .executed
            .iter()
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    pub fn clear_executed(&self) {
        self.catalog().executed.clear();
    }

    pub fn connects(&self) -> Vec<ConnectRecord> {
        self.catalog().connects.clone()
    }

    pub fn closes(&self) -> usize {
        self.catalog().closes
    }
}

pub struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    fn connect(
        &self,
        params: &ConnectParams,
        database: &str,
    ) -> Result<Box<dyn Session>, SqlError> {
        let mut catalog = self.server.catalog();
        if let Some(message) = &catalog.connect_failure {
            return Err(SqlError::Rejected(message.clone()));
        }
        catalog.connects.push(ConnectRecord {
            user: params.user.clone(),
            password: params.password.clone(),
            database: database.into(),
        });
        Ok(Box::new(FakeSession {
            server: self.server.clone(),
            database: database.into(),
        }))
    }
}

struct FakeSession {
    server: FakeServer,
    database: String,
}

impl Query for FakeSession {
    fn query_opt(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SqlError> {
        let catalog = self.server.catalog();
        if let Some(message) = &catalog.query_failure {
            return Err(SqlError::Rejected(message.clone()));
        }
        let db = self.database.as_str();
        let param = |i: usize| params.get(i).copied().unwrap_or_default();
        let text = |value: &str| Some(vec![Some(value.to_string())]);

        let row = match sql {
            ROLE_EXPIRY => catalog
                .roles
                .get(param(0))
                .map(|expiry| vec![expiry.clone()]),
            DATABASE_CONFIG => catalog
                .databases
                .get(param(0))
                .map(|(enc, collate, ctype)| {
                    vec![Some(enc.clone()), Some(collate.clone()), Some(ctype.clone())]
                }),
            SCHEMA_EXISTS => catalog
                .schemas
                .contains(&(db.to_string(), param(0).to_string()))
                .then(|| vec![Some(param(0).to_string())]),
            TABLES_EXIST => catalog
                .tables
                .iter()
                .find(|(d, s, _)| d == db && s == param(0))
                .and_then(|(_, _, table)| text(table.as_str())),
            ANY_GRANT => catalog
                .grants
                .iter()
                .find(|(d, s, ..)| d == db && s == param(0))
                .and_then(|(_, _, table, ..)| text(table.as_str())),
            TABLES_MISSING_GRANT => {
                let wanted: Vec<&str> = param(2).split(',').collect();
                let missing = catalog
                    .tables
                    .iter()
                    .filter(|(d, s, _)| d == db && s == param(0))
                    .filter(|(_, _, table)| {
                        !wanted.iter().all(|privilege| {
                            catalog.grants.contains(&(
                                db.to_string(),
                                param(0).to_string(),
                                table.clone(),
                                param(1).to_string(),
                                (*privilege).to_string(),
                            ))
                        })
                    })
                    .count();
                text(missing.to_string().as_str())
            }
            other => return Err(SqlError::Rejected(format!("unexpected query: {other}"))),
        };
        Ok(row)
    }

    fn execute(&mut self, sql: &str) -> Result<(), SqlError> {
        let mut catalog = self.server.catalog();
        catalog.executed.push((self.database.clone(), sql.to_string()));
        if let Some(message) = &catalog.execute_failure {
            return Err(SqlError::Rejected(message.clone()));
        }

        let words: Vec<&str> = sql.split_whitespace().collect();
        match words.as_slice() {
            ["CREATE", "USER", role, ..] => {
                let role = role.to_lowercase();
                if catalog.roles.contains_key(&role) {
                    return Err(SqlError::Rejected(format!("role \"{role}\" already exists")));
                }
                catalog.roles.insert(role, literal_after(sql, "VALID UNTIL"));
            }
            ["ALTER", "USER", role, ..] => {
                let role = role.to_lowercase();
                let Some(expiry) = catalog.roles.get_mut(&role) else {
                    return Err(SqlError::Rejected(format!("role \"{role}\" does not exist")));
                };
                if let Some(date) = literal_after(sql, "VALID UNTIL") {
                    *expiry = (date != "infinity").then_some(date);
                }
            }
            ["CREATE", "DATABASE", name, ..] => {
                let encoding = literal_after(sql, "ENCODING").unwrap_or_else(|| "UTF8".into());
                let collate =
                    literal_after(sql, "LC_COLLATE").unwrap_or_else(|| "en_US.UTF-8".into());
                let ctype = literal_after(sql, "LC_CTYPE").unwrap_or_else(|| "en_US.UTF-8".into());
                catalog
                    .databases
                    .insert(name.to_lowercase(), (encoding, collate, ctype));
            }
            ["CREATE", "SCHEMA", schema] => {
                let key = (self.database.clone(), schema.to_lowercase());
                if !catalog.schemas.insert(key) {
                    return Err(SqlError::Rejected(format!(
                        "schema \"{schema}\" already exists"
                    )));
                }
            }
            ["GRANT", ..] => {
                let (privileges, rest) = sql["GRANT ".len()..]
                    .split_once(" ON ALL TABLES IN SCHEMA ")
                    .ok_or_else(|| SqlError::Rejected(format!("unsupported grant: {sql}")))?;
                let (schema, grantee) = rest
                    .split_once(" TO ")
                    .ok_or_else(|| SqlError::Rejected(format!("unsupported grant: {sql}")))?;
                let privileges: Vec<String> = if privileges == "ALL" {
                    ALL_PRIVILEGES.iter().map(|p| (*p).to_string()).collect()
                } else {
                    privileges.split(", ").map(str::to_string).collect()
                };
                let tables: Vec<String> = catalog
                    .tables
                    .iter()
                    .filter(|(d, s, _)| *d == self.database && s == schema)
                    .map(|(_, _, table)| table.clone())
                    .collect();
                for table in tables {
                    for privilege in &privileges {
                        catalog.grants.insert((
                            self.database.clone(),
                            schema.to_string(),
                            table.clone(),
                            grantee.to_lowercase(),
                            privilege.clone(),
                        ));
                    }
                }
            }
            _ => return Err(SqlError::Rejected(format!("unsupported statement: {sql}"))),
        }
        Ok(())
    }
}

impl Session for FakeSession {
    fn close(self: Box<Self>) -> Result<(), SqlError> {
        self.server.catalog().closes += 1;
        Ok(())
    }
}

/// Value of the `KEYWORD '...'` clause, if present
fn literal_after(sql: &str, keyword: &str) -> Option<String> {
    let start = sql.find(&format!("{keyword} '"))? + keyword.len() + 2;
    let len = sql[start..].find('\'')?;
    Some(sql[start..start + len].to_string())
}
