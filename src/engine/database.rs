//! Databases, and the server connection every other kind relies on

use super::{Converge, EngineOptions, Plan};
use crate::api::{DatabaseSpec, ResourceKey, ResourceKind};
use crate::error::{ReconcileError, ValidationError};
use crate::pg::{ConnectParams, ConnectionHandle, ConnectionRegistry, DatabaseConfig, StateReader, sql};
use crate::state::{AppliedRecord, Fingerprint};
use crate::validate;

pub struct DatabaseEngine;

pub fn connect_params(spec: &DatabaseSpec) -> ConnectParams {
    ConnectParams {
        address: spec.address.clone(),
        user: spec.user.clone(),
        password: spec.password.clone(),
        database: spec.database.to_lowercase(),
        maintenance_database: spec.maintenance_database.clone(),
    }
}

impl Converge for DatabaseEngine {
    const KIND: ResourceKind = ResourceKind::Database;

    type Spec = DatabaseSpec;
    type Observed = Option<DatabaseConfig>;

    fn validate(spec: &DatabaseSpec) -> Result<(), ValidationError> {
        validate::validate_database(spec)
    }

    /// Resolving here is what replaces the connection after a credential
    /// change, before any other kind uses it again.
    fn connect(
        registry: &ConnectionRegistry,
        key: &ResourceKey,
        spec: &DatabaseSpec,
    ) -> Result<ConnectionHandle, ReconcileError> {
        let resolution = registry.resolve(key, &connect_params(spec))?;
        if let Some(e) = resolution.close_error {
            log::warn!("Failed to close replaced connection for {key}: {e}");
        }
        Ok(resolution.handle)
    }

    fn observe(
        reader: &mut StateReader<'_>,
        spec: &DatabaseSpec,
        _options: &EngineOptions,
    ) -> Result<Option<DatabaseConfig>, ReconcileError> {
        Ok(reader.read_database_config(&spec.database)?)
    }

    fn plan(
        spec: &DatabaseSpec,
        observed: &Option<DatabaseConfig>,
        _desired: &Fingerprint,
        _last: Option<&AppliedRecord>,
    ) -> Result<Plan, ReconcileError> {
        let Some(current) = observed else {
            return Ok(Plan::create(sql::create_database(
                &spec.database,
                spec.encoding.as_deref(),
                spec.lc_collate.as_deref(),
                spec.lc_ctype.as_deref(),
            )));
        };

        let checks = [
            ("encoding", &current.encoding, spec.encoding.as_deref(), true),
            ("collate", &current.collate, spec.lc_collate.as_deref(), false),
            ("ctype", &current.ctype, spec.lc_ctype.as_deref(), false),
        ];
        for (attribute, observed, desired, ignore_case) in checks {
            let Some(desired) = desired else { continue };
            let matches = if ignore_case {
                observed.eq_ignore_ascii_case(desired)
            } else {
                observed == desired
            };
            if !matches {
                return Err(ReconcileError::Irreconcilable {
                    database: spec.database.clone(),
                    attribute,
                    observed: observed.clone(),
                    desired: desired.to_string(),
                });
            }
        }
        Ok(Plan::no_change())
    }
}
