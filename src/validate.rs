//! Spec validation
//!
//! Pure checks, no I/O. Mutating statements interpolate identifiers
//! because PostgreSQL cannot bind them as parameters, so the identifier
//! allow-list here is the injection boundary and must stay strict.

use crate::api::{AccountSpec, DatabaseSpec, GrantSpec, Privilege, PrivilegeSet};
use crate::error::ValidationError;
use chrono::NaiveDate;
use language_tags::LanguageTag;
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern compiles"));

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*:\d{1,5}$").expect("address pattern compiles")
});

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));

/// PostgreSQL truncates longer identifiers (NAMEDATALEN - 1)
/// Longer names are truncated by the server, so lookups would never match
const MAX_IDENTIFIER_LEN: usize = 63;

/// Server encodings PostgreSQL accepts for CREATE DATABASE
pub const ENCODINGS: &[&str] = &[
    "BIG5",
    "EUC_CN",
    "EUC_JP",
    "EUC_JIS_2004",
    "EUC_KR",
    "EUC_TW",
    "GB18030",
    "GBK",
    "ISO_8859_5",
    "ISO_8859_6",
    "ISO_8859_7",
    "ISO_8859_8",
    "JOHAB",
    "KOI8R",
    "KOI8U",
    "LATIN1",
    "LATIN2",
    "LATIN3",
    "LATIN4",
    "LATIN5",
    "LATIN6",
    "LATIN7",
    "LATIN8",
    "LATIN9",
    "LATIN10",
    "MULE_INTERNAL",
    "SJIS",
    "SHIFT_JIS_2004",
    "SQL_ASCII",
    "UHC",
    "UTF8",
    "WIN866",
    "WIN874",
    "WIN1250",
    "WIN1251",
    "WIN1252",
    "WIN1253",
    "WIN1254",
    "WIN1255",
    "WIN1256",
    "WIN1257",
    "WIN1258",
];

pub fn validate_database(spec: &DatabaseSpec) -> Result<(), ValidationError> {
    address(&spec.address)?;
    identifier("user", &spec.user)?;
    password("password", &spec.password)?;
    identifier("database", &spec.database)?;
    identifier("maintenance_database", &spec.maintenance_database)?;
    if let Some(enc) = &spec.encoding {
        encoding(enc)?;
    }
    if let Some(collate) = &spec.lc_collate {
        locale("lc_collate", collate)?;
    }
    if let Some(ctype) = &spec.lc_ctype {
        locale("lc_ctype", ctype)?;
    }
    Ok(())
}

pub fn validate_account(spec: &AccountSpec) -> Result<(), ValidationError> {
    reference("database", &spec.database)?;
    identifier("role", &spec.role)?;
    password("password", &spec.password)?;
    valid_until(&spec.valid_until)?;
    Ok(())
}

pub fn validate_grant(spec: &GrantSpec) -> Result<(), ValidationError> {
    reference("database", &spec.database)?;
    identifier("schema", &spec.schema)?;
    identifier("to", &spec.to)?;
    privileges(&spec.privileges)?;
    Ok(())
}

/// Check a role, database or schema name against the allow-list
pub fn identifier(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !IDENTIFIER.is_match(value) {
        return Err(ValidationError::new(field, value, "must match ^[A-Za-z0-9_]+$"));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::new(
            field,
            value,
            format!("must be at most {MAX_IDENTIFIER_LEN} characters"),
        ));
    }
    Ok(())
}

/// `host:port`, host being one or more dot-separated labels
pub fn address(value: &str) -> Result<(), ValidationError> {
    if ADDRESS.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("address", value, "expected host:port"))
    }
}

pub fn encoding(value: &str) -> Result<(), ValidationError> {
    if ENCODINGS.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "encoding",
            value,
            "not a PostgreSQL server encoding",
        ))
    }
}

/// Locale names as PostgreSQL takes them: `C`, `POSIX`, or
/// `ll[_CC][.codeset][@modifier]` whose language part is a language tag.
pub fn locale(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value == "C" || value == "POSIX" || value == "C.UTF-8" {
        return Ok(());
    }
    if value.contains(['\'', '\\']) {
        return Err(ValidationError::new(field, value, "not a valid locale"));
    }

    let without_modifier = value.split_once('@').map_or(value, |(head, _)| head);
    let (tag, codeset) = match without_modifier.split_once('.') {
        Some((tag, codeset)) => (tag, Some(codeset)),
        None => (without_modifier, None),
    };
    if let Some(codeset) = codeset
        && (codeset.is_empty()
            || !codeset
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'))
    {
        return Err(ValidationError::new(field, value, "invalid codeset"));
    }

    match LanguageTag::parse(&tag.replace('_', "-")) {
        Ok(_) => Ok(()),
        Err(e) => Err(ValidationError::new(field, value, e.to_string())),
    }
}

/// `YYYY-MM-DD`; empty means no expiry
pub fn valid_until(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    if !DATE.is_match(value) {
        return Err(ValidationError::new("valid_until", value, "expected YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| ValidationError::new("valid_until", value, e.to_string()))
}

/// Parse a grant type list; `all` must stand alone
pub fn privileges(values: &[String]) -> Result<PrivilegeSet, ValidationError> {
    let rendered = || format!("{values:?}");
    if values.is_empty() {
        return Err(ValidationError::new(
            "grant types",
            &rendered(),
            "at least one grant type is required",
        ));
    }

    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        let privilege = match value.to_ascii_lowercase().as_str() {
            "select" => Privilege::Select,
            "insert" => Privilege::Insert,
            "update" => Privilege::Update,
            "delete" => Privilege::Delete,
            "truncate" => Privilege::Truncate,
            "all" if values.len() == 1 => return Ok(PrivilegeSet::All),
            "all" => {
                return Err(ValidationError::new(
                    "grant types",
                    &rendered(),
                    "all cannot be combined with other grant types",
                ));
            }
            _ => {
                return Err(ValidationError::new(
                    "grant types",
                    &rendered(),
                    format!("unknown grant type {value}"),
                ));
            }
        };
        if !parsed.contains(&privilege) {
            parsed.push(privilege);
        }
    }
    Ok(PrivilegeSet::Some(parsed))
}

fn password(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::secret(field, "must not contain NUL characters"));
    }
    Ok(())
}

fn reference(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(
            field,
            value,
            "must name a database resource",
        ));
    }
    Ok(())
}
