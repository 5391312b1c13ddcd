//! Process-wide connection registry
//!
//! One slot per server identity. The slot map lock is only held long enough
//! to find or insert a slot; every read-modify-write of an entry happens
//! under that slot's own lock, so reconciles of different servers never
//! wait on each other.

use super::session::{ConnectParams, Connector, Query, Session, SqlError};
use crate::api::ServerIdentity;
use crate::error::ConnError;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Slot = Arc<Mutex<Option<Entry>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle on one open session
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    id: u64,
    target: String,
    session: Mutex<Option<Box<dyn Session>>>,
}

impl ConnectionHandle {
    fn new(id: u64, target: String, session: Box<dyn Session>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                target,
                session: Mutex::new(Some(session)),
            }),
        }
    }

    /// Whether both handles share the same underlying session
    #[cfg(test)]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// `address/database` this handle is connected to
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Exclusive use of the session for one cycle
    pub fn lock(&self) -> Result<SessionGuard<'_>, ConnError> {
        let guard = lock(&self.inner.session);
        if guard.is_none() {
            return Err(ConnError::Closed {
                target: self.inner.target.clone(),
            });
        }
        Ok(SessionGuard { guard })
    }

    /// Close the session; later users get [`ConnError::Closed`]
    pub fn close(&self) -> Result<(), SqlError> {
        let session = lock(&self.inner.session).take();
        match session {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("target", &self.inner.target)
            .finish()
    }
}

pub struct SessionGuard<'a> {
    guard: MutexGuard<'a, Option<Box<dyn Session>>>,
}

impl Query for SessionGuard<'_> {
    fn query_opt(
        &mut self,
        sql: &str,
        params: &[&str],
    ) -> Result<Option<Vec<Option<String>>>, SqlError> {
        self.guard
            .as_mut()
            .ok_or(SqlError::Closed)?
            .query_opt(sql, params)
    }

    fn execute(&mut self, sql: &str) -> Result<(), SqlError> {
        self.guard.as_mut().ok_or(SqlError::Closed)?.execute(sql)
    }
}

struct Entry {
    params: ConnectParams,
    /// Opened into the maintenance database
    server: ConnectionHandle,
    /// Opened into the managed database on first use
    scoped: Option<ConnectionHandle>,
}

impl Entry {
    fn close(self) -> Result<(), SqlError> {
        let scoped = self.scoped.map_or(Ok(()), |handle| handle.close());
        self.server.close().and(scoped)
    }
}

/// What [`ConnectionRegistry::resolve`] did
#[derive(Debug)]
pub struct Resolution {
    pub handle: ConnectionHandle,
    /// An entry with other credentials was torn down
    pub replaced: bool,
    /// Closing the replaced entry failed; the new connection was installed
    /// anyway
    pub close_error: Option<SqlError>,
}

pub struct ConnectionRegistry {
    connector: Box<dyn Connector>,
    slots: Mutex<HashMap<ServerIdentity, Slot>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn slot(&self, identity: &ServerIdentity) -> Slot {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(identity.clone()).or_default())
    }

    fn existing_slot(&self, identity: &ServerIdentity) -> Option<Slot> {
        lock(&self.slots).get(identity).cloned()
    }

    fn open(
        &self,
        identity: &ServerIdentity,
        params: &ConnectParams,
        database: &str,
    ) -> Result<ConnectionHandle, ConnError> {
        let session = self
            .connector
            .connect(params, database)
            .map_err(|source| ConnError::Open {
                identity: identity.clone(),
                address: params.address.clone(),
                user: params.user.clone(),
                source,
            })?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let target = format!("{}/{database}", params.address);
        log::info!("Opened connection #{id} to {target} for {identity}");
        Ok(ConnectionHandle::new(id, target, session))
    }

    /// Return the server connection for `identity`, opening or replacing it
    /// when address, user or password changed since it was opened.
    pub fn resolve(
        &self,
        identity: &ServerIdentity,
        params: &ConnectParams,
    ) -> Result<Resolution, ConnError> {
        let slot = self.slot(identity);
        let mut entry = lock(&slot);

        if let Some(current) = entry.as_mut()
            && current.params.same_credentials(params)
        {
            if current.params.database != params.database
                && let Some(scoped) = current.scoped.take()
                && let Err(e) = scoped.close()
            {
                log::warn!("Failed to close {}: {e}", scoped.target());
            }
            current.params = params.clone();
            return Ok(Resolution {
                handle: current.server.clone(),
                replaced: false,
                close_error: None,
            });
        }

        let mut replaced = false;
        let mut close_error = None;
        if let Some(previous) = entry.take() {
            replaced = true;
            log::info!("Credentials changed for {identity}, replacing connection");
            close_error = previous.close().err();
        }

        let server = self.open(identity, params, &params.maintenance_database)?;
        *entry = Some(Entry {
            params: params.clone(),
            server: server.clone(),
            scoped: None,
        });
        Ok(Resolution {
            handle: server,
            replaced,
            close_error,
        })
    }

    /// Current server connection, if the database resource resolved one
    pub fn server(&self, identity: &ServerIdentity) -> Option<ConnectionHandle> {
        let slot = self.existing_slot(identity)?;
        let entry = lock(&slot);
        entry.as_ref().map(|e| e.server.clone())
    }

    /// Connection into the managed database, opened on first use with the
    /// credentials of the server connection. `None` when the database
    /// resource has no live entry.
    pub fn database(
        &self,
        identity: &ServerIdentity,
    ) -> Result<Option<ConnectionHandle>, ConnError> {
        let Some(slot) = self.existing_slot(identity) else {
            return Ok(None);
        };
        let mut entry = lock(&slot);
        let Some(current) = entry.as_mut() else {
            return Ok(None);
        };
        if let Some(scoped) = &current.scoped {
            return Ok(Some(scoped.clone()));
        }

        let scoped = self.open(identity, &current.params, &current.params.database)?;
        current.scoped = Some(scoped.clone());
        Ok(Some(scoped))
    }

    /// Drop the entry of a database resource that no longer exists
    pub fn evict(&self, identity: &ServerIdentity) {
        let Some(slot) = lock(&self.slots).remove(identity) else {
            return;
        };
        if let Some(entry) = lock(&slot).take() {
            log::info!("Closing connections of removed database resource {identity}");
            if let Err(e) = entry.close() {
                log::warn!("Failed to close connection for {identity}: {e}");
            }
        }
    }

    pub fn identities(&self) -> Vec<ServerIdentity> {
        lock(&self.slots).keys().cloned().collect()
    }

    pub fn close_all(&self) {
        for identity in self.identities() {
            self.evict(&identity);
        }
    }
}
