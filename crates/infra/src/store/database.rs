use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value as JsonValue;

use millerp_core::DomainResult;
use millerp_events::EventEnvelope;

use super::Tables;
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Default)]
struct State {
    version: u64,
    tables: Tables,
}

/// Outcome of a committed transaction.
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    /// Store version created by this commit.
    pub version: u64,
    /// Rows written by the transaction.
    pub changes: usize,
    /// Events queued by the transaction, in emission order.
    pub events: Vec<EventEnvelope<JsonValue>>,
}

/// Store with serialized, all-or-nothing write transactions.
///
/// A transaction costs the rows it touches, not the size of the store.
#[derive(Debug, Default)]
pub struct Database {
    state: RwLock<State>,
}

fn poisoned() -> ServiceError {
    ServiceError::Storage("store lock poisoned".to_string())
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> ServiceResult<u64> {
        Ok(self.lock_read()?.version)
    }

    fn lock_read(&self) -> ServiceResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn lock_write(&self) -> ServiceResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| poisoned())
    }

    /// Run `op` against a consistent view of the committed state.
    pub fn read<T>(&self, op: impl FnOnce(&Tables) -> DomainResult<T>) -> ServiceResult<T> {
        let guard = self.lock_read()?;
        Ok(op(&guard.tables)?)
    }

    /// Run `op` with exclusive access to the tables.
    ///
    /// On success every change is committed and the queued events are
    /// returned; a domain error rolls every change back.
    pub fn transact<T>(&self, op: impl FnOnce(&mut Tables) -> DomainResult<T>) -> ServiceResult<Committed<T>> {
        let mut guard = self.lock_write()?;
        let state = &mut *guard;
        let checkpoint = state.tables.checkpoint();

        match op(&mut state.tables) {
            Ok(value) => {
                let changes = state.tables.changes();
                let events = state.tables.commit();
                state.version += 1;
                Ok(Committed {
                    value,
                    version: state.version,
                    changes,
                    events,
                })
            }
            Err(err) => {
                state.tables.rollback(checkpoint);
                Err(err.into())
            }
        }
    }
}
