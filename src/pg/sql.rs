//! Mutating statement builders
//!
//! PostgreSQL cannot bind identifiers, nor literals in utility statements
//! such as `CREATE USER ... PASSWORD`, so these interpolate. Callers must
//! only pass values that passed [`crate::validate`]; literals are still
//! quoted by doubling single quotes.

use crate::api::PrivilegeSet;
use std::fmt;

const REDACTED: &str = "'<redacted>'";

/// A statement plus a display form safe for logs and error messages
#[derive(Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    display: String,
}

impl Statement {
    fn plain(sql: String) -> Self {
        Self {
            display: sql.clone(),
            sql,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Redacted text
    pub fn display(&self) -> &str {
        &self.display
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Statement").field(&self.display).finish()
    }
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn create_role(role: &str, password: &str, valid_until: &str) -> Statement {
    role_statement("CREATE", role, password, (!valid_until.is_empty()).then_some(valid_until))
}

/// An empty `valid_until` clears the expiry
pub fn alter_role(role: &str, password: &str, valid_until: &str) -> Statement {
    let expiry = if valid_until.is_empty() {
        "infinity"
    } else {
        valid_until
    };
    role_statement("ALTER", role, password, Some(expiry))
}

fn role_statement(verb: &str, role: &str, password: &str, expiry: Option<&str>) -> Statement {
    let head = format!("{verb} USER {role} WITH PASSWORD ");
    let tail = expiry
        .map(|date| format!(" VALID UNTIL {}", quote_literal(date)))
        .unwrap_or_default();
    Statement {
        sql: format!("{head}{}{tail}", quote_literal(password)),
        display: format!("{head}{REDACTED}{tail}"),
    }
}

pub fn create_database(
    name: &str,
    encoding: Option<&str>,
    lc_collate: Option<&str>,
    lc_ctype: Option<&str>,
) -> Statement {
    let mut sql = format!("CREATE DATABASE {name}");
    for (keyword, value) in [
        ("ENCODING", encoding),
        ("LC_COLLATE", lc_collate),
        ("LC_CTYPE", lc_ctype),
    ] {
        if let Some(value) = value {
            sql.push_str(&format!(" {keyword} {}", quote_literal(value)));
        }
    }
    Statement::plain(sql)
}

pub fn create_schema(schema: &str) -> Statement {
    Statement::plain(format!("CREATE SCHEMA {}", schema.to_lowercase()))
}

pub fn grant_on_all_tables(privileges: &PrivilegeSet, schema: &str, grantee: &str) -> Statement {
    Statement::plain(format!(
        "GRANT {} ON ALL TABLES IN SCHEMA {} TO {grantee}",
        privileges.sql(),
        schema.to_lowercase()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Privilege;

    #[test]
    fn test_create_role() {
        let stmt = create_role("svc", "p1", "");
        assert_eq!(stmt.sql(), "CREATE USER svc WITH PASSWORD 'p1'");
        assert_eq!(stmt.display(), "CREATE USER svc WITH PASSWORD '<redacted>'");

        let stmt = create_role("svc", "it's", "2030-01-31");
        assert_eq!(
            stmt.sql(),
            "CREATE USER svc WITH PASSWORD 'it''s' VALID UNTIL '2030-01-31'"
        );
        assert!(!format!("{stmt} {stmt:?}").contains("it''s"));
    }

    #[test]
    fn test_alter_role_clears_expiry_with_infinity() {
        assert_eq!(
            alter_role("svc", "p2", "").sql(),
            "ALTER USER svc WITH PASSWORD 'p2' VALID UNTIL 'infinity'"
        );
        assert_eq!(
            alter_role("svc", "p2", "2031-12-01").display(),
            "ALTER USER svc WITH PASSWORD '<redacted>' VALID UNTIL '2031-12-01'"
        );
    }

    #[test]
    fn test_create_database_appends_only_given_clauses() {
        assert_eq!(create_database("app", None, None, None).sql(), "CREATE DATABASE app");
        assert_eq!(
            create_database("app", Some("UTF8"), None, Some("en_US.UTF-8")).sql(),
            "CREATE DATABASE app ENCODING 'UTF8' LC_CTYPE 'en_US.UTF-8'"
        );
    }

    #[test]
    fn test_schema_and_grant_fold_schema_name() {
        assert_eq!(create_schema("App").sql(), "CREATE SCHEMA app");
        let privileges = PrivilegeSet::Some(vec![Privilege::Select, Privilege::Insert]);
        assert_eq!(
            grant_on_all_tables(&privileges, "App", "svc").sql(),
            "GRANT SELECT, INSERT ON ALL TABLES IN SCHEMA app TO svc"
        );
    }
}
