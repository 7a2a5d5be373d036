//! Domain event publication mechanics.
//!
//! Events describe committed ledger and order transitions. They are published
//! only after the owning transaction commits; consumers must be idempotent.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
