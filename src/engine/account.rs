//! Login roles

use super::{Converge, EngineOptions, Plan};
use crate::api::{AccountSpec, ResourceKey, ResourceKind};
use crate::error::{ReconcileError, ValidationError};
use crate::pg::{ConnectionHandle, ConnectionRegistry, RoleState, StateReader, sql};
use crate::state::{AppliedRecord, Fingerprint};
use crate::validate;

pub struct AccountEngine;

impl Converge for AccountEngine {
    const KIND: ResourceKind = ResourceKind::Account;

    type Spec = AccountSpec;
    type Observed = Option<RoleState>;

    fn validate(spec: &AccountSpec) -> Result<(), ValidationError> {
        validate::validate_account(spec)
    }

    fn connect(
        registry: &ConnectionRegistry,
        key: &ResourceKey,
        spec: &AccountSpec,
    ) -> Result<ConnectionHandle, ReconcileError> {
        let database = key.sibling(&spec.database);
        registry
            .server(&database)
            .ok_or(ReconcileError::DependencyNotReady { database })
    }

    fn observe(
        reader: &mut StateReader<'_>,
        spec: &AccountSpec,
        _options: &EngineOptions,
    ) -> Result<Option<RoleState>, ReconcileError> {
        Ok(reader.read_role_expiry(&spec.role)?)
    }

    fn plan(
        spec: &AccountSpec,
        observed: &Option<RoleState>,
        desired: &Fingerprint,
        last: Option<&AppliedRecord>,
    ) -> Result<Plan, ReconcileError> {
        let Some(role) = observed else {
            return Ok(Plan::create(sql::create_role(
                &spec.role,
                &spec.password,
                &spec.valid_until,
            )));
        };

        let wanted_expiry = (!spec.valid_until.is_empty()).then_some(spec.valid_until.as_str());
        let expiry_changed = role.valid_until.as_deref() != wanted_expiry;
        // Without a record the stored password is unknown, so apply it once
        let password_changed = last.is_none_or(|record| !desired.same_secret(record));

        if expiry_changed || password_changed {
            Ok(Plan::alter(sql::alter_role(
                &spec.role,
                &spec.password,
                &spec.valid_until,
            )))
        } else {
            Ok(Plan::no_change())
        }
    }

    fn secret(spec: &AccountSpec) -> Option<&str> {
        Some(&spec.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{account_spec, database_spec, engine, main_key};
    use crate::engine::{DatabaseEngine, Mode, Outcome, converge};
    use crate::pg::fake::FakeServer;

    fn svc() -> ResourceKey {
        ResourceKey::new("default", "svc")
    }

    fn ready_engine(server: &FakeServer) -> crate::engine::Engine {
        let engine = engine(server);
        converge::<DatabaseEngine>(&engine, &main_key(), &database_spec(), Mode::Apply).unwrap();
        server.clear_executed();
        engine
    }

    #[test]
    fn test_creates_missing_role_then_is_idempotent() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        let spec = account_spec("p1", "");

        let plan = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::Create);
        assert_eq!(server.executed(), vec!["CREATE USER svc WITH PASSWORD 'p1'"]);

        let plan = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::NoChange);
        assert_eq!(server.executed().len(), 1);
    }

    #[test]
    fn test_password_change_alters_role() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        converge::<AccountEngine>(&engine, &svc(), &account_spec("p1", ""), Mode::Apply).unwrap();

        let plan =
            converge::<AccountEngine>(&engine, &svc(), &account_spec("p2", ""), Mode::Apply)
                .unwrap();
        assert_eq!(plan.outcome, Outcome::Alter);
        assert_eq!(
            server.executed().last().unwrap(),
            "ALTER USER svc WITH PASSWORD 'p2' VALID UNTIL 'infinity'"
        );
    }

    #[test]
    fn test_expiry_drift_alters_role() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        let spec = account_spec("p1", "2030-01-31");
        converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();

        // Someone cleared the expiry by hand
        server.add_role("svc", None);
        let plan = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::Alter);
        assert_eq!(
            server.role_expiry("svc"),
            Some(Some("2030-01-31".to_string()))
        );
    }

    #[test]
    fn test_existing_role_without_record_is_altered_once() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        server.add_role("svc", None);

        let spec = account_spec("p1", "");
        let first = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();
        let second = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();
        assert_eq!(first.outcome, Outcome::Alter);
        assert_eq!(second.outcome, Outcome::NoChange);
    }

    #[test]
    fn test_failed_apply_is_retried() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        let spec = account_spec("p1", "");

        server.fail_execute("permission denied to create role");
        let err = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap_err();
        assert!(matches!(err, ReconcileError::Query(_)));
        assert!(!err.to_string().contains("'p1'"));
        assert!(engine.store.applied(ResourceKind::Account, &svc()).is_none());

        server.recover();
        let plan = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap();
        assert_eq!(plan.outcome, Outcome::Create);
    }

    #[test]
    fn test_missing_database_connection_fails_fast() {
        let server = FakeServer::new();
        let engine = engine(&server);

        let err = converge::<AccountEngine>(&engine, &svc(), &account_spec("p1", ""), Mode::Apply)
            .unwrap_err();
        assert!(matches!(err, ReconcileError::DependencyNotReady { .. }));
        assert!(server.connects().is_empty());
    }

    #[test]
    fn test_invalid_spec_never_connects() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);
        let mut spec = account_spec("p1", "");
        spec.role = "svc; DROP ROLE admin".into();

        let err = converge::<AccountEngine>(&engine, &svc(), &spec, Mode::Apply).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
        assert!(server.executed().is_empty());
    }

    #[test]
    fn test_preview_executes_nothing() {
        let server = FakeServer::new();
        let engine = ready_engine(&server);

        let plan =
            converge::<AccountEngine>(&engine, &svc(), &account_spec("p1", ""), Mode::Preview)
                .unwrap();
        assert_eq!(plan.outcome, Outcome::Create);
        assert!(server.executed().is_empty());
        assert!(engine.store.applied(ResourceKind::Account, &svc()).is_none());
    }
}
