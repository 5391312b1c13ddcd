//! Table privileges on every table of a schema

use super::{Converge, EngineOptions, Outcome, Plan};
use crate::api::{GrantSpec, ResourceKey, ResourceKind};
use crate::error::{ReconcileError, ValidationError};
use crate::pg::{ConnectionHandle, ConnectionRegistry, StateReader, sql};
use crate::state::{AppliedRecord, Fingerprint};
use crate::validate;

pub struct GrantEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantObservation {
    pub schema_exists: bool,
    pub tables_present: bool,
    pub grant_present: bool,
}

impl Converge for GrantEngine {
    const KIND: ResourceKind = ResourceKind::Grant;

    type Spec = GrantSpec;
    type Observed = GrantObservation;

    fn validate(spec: &GrantSpec) -> Result<(), ValidationError> {
        validate::validate_grant(spec)
    }

    /// Schemas live inside the managed database, so this needs the scoped
    /// connection of the referenced database resource.
    fn connect(
        registry: &ConnectionRegistry,
        key: &ResourceKey,
        spec: &GrantSpec,
    ) -> Result<ConnectionHandle, ReconcileError> {
        let database = key.sibling(&spec.database);
        registry
            .database(&database)?
            .ok_or(ReconcileError::DependencyNotReady { database })
    }

    fn observe(
        reader: &mut StateReader<'_>,
        spec: &GrantSpec,
        options: &EngineOptions,
    ) -> Result<GrantObservation, ReconcileError> {
        let privileges = validate::privileges(&spec.privileges)?;

        let schema_exists = reader.schema_exists(&spec.schema)?;
        let tables_present = schema_exists && reader.tables_exist_in(&spec.schema)?;
        let grant_present = tables_present
            && reader.grant_exists(
                options.grant_probe,
                &spec.schema,
                &spec.to,
                &privileges.catalog_names(),
            )?;

        Ok(GrantObservation {
            schema_exists,
            tables_present,
            grant_present,
        })
    }

    fn plan(
        spec: &GrantSpec,
        observed: &GrantObservation,
        _desired: &Fingerprint,
        _last: Option<&AppliedRecord>,
    ) -> Result<Plan, ReconcileError> {
        let privileges = validate::privileges(&spec.privileges)?;
        let mut statements = Vec::new();

        if !observed.schema_exists {
            statements.push(sql::create_schema(&spec.schema));
        }
        if !observed.tables_present {
            return Ok(Plan {
                statements,
                outcome: Outcome::Deferred {
                    reason: format!("schema {} has no tables yet", spec.schema.to_lowercase()),
                },
            });
        }
        if observed.grant_present {
            return Ok(Plan::no_change());
        }

        statements.push(sql::grant_on_all_tables(&privileges, &spec.schema, &spec.to));
        Ok(Plan {
            statements,
            outcome: Outcome::Create,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{database_spec, engine, grant_spec, main_key};
    use crate::engine::{DatabaseEngine, Engine, EngineOptions, Mode, converge};
    use crate::pg::GrantProbe;
    use crate::pg::fake::FakeServer;

    fn read() -> ResourceKey {
        ResourceKey::new("default", "read")
    }

    fn ready_engine(server: &FakeServer) -> Engine {
        let engine = engine(server);
        converge::<DatabaseEngine>(&engine, &main_key(), &database_spec(), Mode::Apply).unwrap();
        server.clear_executed();
        engine
    }

    #[test]
    fn test_creates_schema_then_defers_without_tables() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);

        let plan = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();
        assert_eq!(server.executed(), vec!["CREATE SCHEMA app"]);
        assert!(server.has_schema("app", "app"));
        assert!(matches!(plan.outcome, Outcome::Deferred { .. }));
    }

    #[test]
    fn test_empty_schema_defers_with_no_statements() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        server.add_schema("app", "app");

        let plan = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();
        assert!(plan.statements.is_empty());
        assert!(matches!(plan.outcome, Outcome::Deferred { .. }));
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_grants_once_tables_exist() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        server.add_table("app", "app", "orders");

        let plan = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::Create);
        assert_eq!(
            server.executed(),
            vec!["GRANT SELECT, INSERT ON ALL TABLES IN SCHEMA app TO svc"]
        );

        let plan = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::NoChange);
        assert_eq!(server.executed().len(), 1);
    }

    #[test]
    fn test_exact_probe_regrants_new_tables() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        server.add_table("app", "app", "orders");
        converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();

        server.add_table("app", "app", "invoices");
        let plan = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::Create);
    }

    #[test]
    fn test_coarse_probe_accepts_any_grant_row() {
        let server = FakeServer::new();
        let mut engine = ready_engine(&server);
        engine.options = EngineOptions {
            grant_probe: GrantProbe::Coarse,
        };
        server.add_table("app", "app", "orders");
        server.add_grant("app", "app", "orders", "someone_else", "SELECT");

        let plan = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::NoChange);
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_grant_runs_inside_managed_database() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap();

        let databases: Vec<String> = server.connects().into_iter().map(|c| c.database).collect();
        assert_eq!(databases, vec!["postgres", "app"]);
    }

    #[test]
    fn test_requires_ready_database() {
        let server = FakeServer::new();
        let engine = engine(&server);

        let err = converge::<GrantEngine>(&engine, &read(), &grant_spec(), Mode::Apply).unwrap_err();
        assert!(err.to_string().contains("default/main"));
        assert!(matches!(err, ReconcileError::DependencyNotReady { .. }));
    }

    #[test]
    fn test_all_mixed_with_others_is_rejected() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        let spec = GrantSpec {
            privileges: vec!["all".into(), "select".into()],
            ..grant_spec()
        };

        let err = converge::<GrantEngine>(&engine, &read(), &spec, Mode::Apply).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }
}
