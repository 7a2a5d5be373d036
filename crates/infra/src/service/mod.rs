//! Application service: every business operation as one atomic transaction.
//!
//! ```text
//! load → domain transition → ledger movements → commit → publish
//! ```
//!
//! Events queued while an operation runs are published to the bus only after
//! the commit succeeds. A publish failure is logged and does not undo the
//! commit; the ledger stays the source of truth.

mod catalog;
mod outbound;
mod production;
mod purchasing;
mod stocktake;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use millerp_core::DomainResult;
use millerp_events::{EventBus, EventEnvelope, Subscription};

use crate::clock::{Clock, SystemClock};
use crate::config::ErpConfig;
use crate::error::ServiceResult;
use crate::store::{Database, Tables};

pub use outbound::NewOutbound;

/// Facade over the store: inventory, purchasing, production and outbound.
pub struct ErpService<B> {
    db: Database,
    bus: B,
    config: ErpConfig,
    clock: Arc<dyn Clock>,
}

impl<B> ErpService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(config: ErpConfig, bus: B) -> Self {
        Self::with_clock(config, bus, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ErpConfig, bus: B, clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Database::new(),
            bus,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &ErpConfig {
        &self.config
    }

    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }

    /// Run one operation atomically, then publish what it emitted.
    fn execute<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce(&mut Tables, DateTime<Utc>) -> DomainResult<T>,
    ) -> ServiceResult<T> {
        let at = self.clock.now();
        match self.db.transact(|tables| op(tables, at)) {
            Ok(committed) => {
                tracing::debug!(
                    operation,
                    version = committed.version,
                    changes = committed.changes,
                    events = committed.events.len(),
                    "committed"
                );
                for envelope in committed.events {
                    let event_type = envelope.event_type().to_string();
                    if let Err(e) = self.bus.publish(envelope) {
                        tracing::error!(operation, event_type, error = ?e, "publish after commit failed");
                    }
                }
                Ok(committed.value)
            }
            Err(err) => {
                tracing::warn!(operation, error = %err, "operation rejected");
                Err(err)
            }
        }
    }

    fn query<T>(&self, op: impl FnOnce(&Tables) -> DomainResult<T>) -> ServiceResult<T> {
        self.db.read(op)
    }
}
