//! Infrastructure layer: transactional store, configuration, and the
//! application service that runs every operation against the ledger.

pub mod clock;
pub mod config;
pub mod error;
pub mod service;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ErpConfig;
pub use error::{ServiceError, ServiceResult};
pub use service::{ErpService, NewOutbound};
pub use store::{Database, Table, Tables};

mod integration_tests;
