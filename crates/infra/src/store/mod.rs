//! In-memory transactional store.
//!
//! All state lives in one [`Tables`] value behind a reader/writer lock.
//! Writers are serialized: a transaction holds the write lock, changes the
//! tables in place and either commits or rolls its journal back.

mod database;
mod table;
mod tables;

pub use database::{Committed, Database};
pub use table::Table;
pub use tables::Tables;
