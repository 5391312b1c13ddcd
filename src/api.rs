//! Desired-state types for the managed PostgreSQL objects
//!
//! These mirror the manifest entries one to one. They carry raw user input;
//! [`crate::validate`] decides whether a spec is well formed before any
//! engine touches a server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace used when a manifest entry does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Database every server connection opens into unless told otherwise
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";

/// (namespace, name) pair identifying one declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a sibling resource in the same namespace
    pub fn sibling(&self, name: &str) -> Self {
        Self::new(self.namespace.clone(), name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of a target server's connection entry: the key of the
/// database resource that declares it.
pub type ServerIdentity = ResourceKey;

/// The kinds of resources this tool reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Account,
    Grant,
}

impl ResourceKind {
    pub const ALL: [Self; 3] = [Self::Database, Self::Account, Self::Grant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Account => "account",
            Self::Grant => "grant",
        }
    }

    /// Execution stage; accounts and grants need their database first
    pub fn stage(&self) -> usize {
        match self {
            Self::Database => 0,
            Self::Account => 1,
            Self::Grant => 2,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim_end_matches('s') {
            "database" => Ok(Self::Database),
            "account" => Ok(Self::Account),
            "grant" => Ok(Self::Grant),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

/// A target server plus the database to manage on it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    /// `host:port` of the server
    pub address: String,
    /// Administrative user the tool connects as
    pub user: String,
    pub password: String,
    /// Name of the database to create
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lc_collate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lc_ctype: Option<String>,
    /// Database the server connection opens into
    #[serde(default = "default_maintenance_database")]
    pub maintenance_database: String,
}

fn default_maintenance_database() -> String {
    DEFAULT_MAINTENANCE_DATABASE.to_string()
}

impl fmt::Debug for DatabaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSpec")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("encoding", &self.encoding)
            .field("lc_collate", &self.lc_collate)
            .field("lc_ctype", &self.lc_ctype)
            .field("maintenance_database", &self.maintenance_database)
            .finish()
    }
}

/// A login role on the server of a database resource
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    /// Logical name of the database resource this role lives on
    pub database: String,
    /// Role name
    pub role: String,
    pub password: String,
    /// `YYYY-MM-DD`, empty for no expiry
    #[serde(default)]
    pub valid_until: String,
}

impl fmt::Debug for AccountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSpec")
            .field("database", &self.database)
            .field("role", &self.role)
            .field("password", &"<redacted>")
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

/// Table privileges for a role on every table of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSpec {
    /// Logical name of the database resource holding the schema
    pub database: String,
    /// Subset of select/insert/update/delete/truncate, or exactly `all`
    #[serde(alias = "type")]
    pub privileges: Vec<String>,
    /// Grantee role
    pub to: String,
    pub schema: String,
}

/// A validated table privilege
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Privilege {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
}

impl Privilege {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
        }
    }
}

/// Validated grant type list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeSet {
    All,
    Some(Vec<Privilege>),
}

impl PrivilegeSet {
    /// Privilege list as it appears in a GRANT statement
    pub fn sql(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Some(privileges) => privileges
                .iter()
                .map(Privilege::keyword)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Privilege names as reported by `information_schema.role_table_grants`
    pub fn catalog_names(&self) -> Vec<&'static str> {
        match self {
            Self::All => vec![
                "SELECT",
                "INSERT",
                "UPDATE",
                "DELETE",
                "TRUNCATE",
                "REFERENCES",
                "TRIGGER",
            ],
            Self::Some(privileges) => privileges.iter().map(Privilege::keyword).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_accepts_plural_and_case() {
        assert_eq!("Grants".parse::<ResourceKind>(), Ok(ResourceKind::Grant));
        assert_eq!("database".parse::<ResourceKind>(), Ok(ResourceKind::Database));
        assert!("table".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let spec = AccountSpec {
            database: "main".into(),
            role: "svc".into(),
            password: "hunter2".into(),
            valid_until: String::new(),
        };
        let rendered = format!("{spec:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_privilege_set_sql() {
        let set = PrivilegeSet::Some(vec![Privilege::Select, Privilege::Insert]);
        assert_eq!(set.sql(), "SELECT, INSERT");
        assert_eq!(PrivilegeSet::All.sql(), "ALL");
        assert_eq!(PrivilegeSet::All.catalog_names().len(), 7);
    }

    #[test]
    fn test_grant_spec_accepts_type_alias() {
        let spec: GrantSpec = serde_json::from_str(
            r#"{"database":"main","type":["select"],"to":"svc","schema":"app"}"#,
        )
        .unwrap();
        assert_eq!(spec.privileges, vec!["select".to_string()]);
    }
}
