//! Inventory domain module.
//!
//! Stock items, the movement ledger, material batches with FIFO allocation,
//! stocktakes and ledger-derived statistics. Pure domain logic: no IO, no
//! locking. Storage is reached through [`ledger::LedgerStore`].

pub mod allocator;
pub mod batch;
pub mod events;
pub mod item;
pub mod ledger;
pub mod movement;
pub mod statistics;
pub mod stocktake;

pub use allocator::{Allocation, allocate};
pub use batch::{BatchId, BatchStatus, MaterialBatch, NewBatch, batch_number};
pub use events::{
    BatchExpired, BatchOpened, InventoryEvent, ItemRegistered, StockMoved, StockTakeConfirmed,
};
pub use item::{ItemKind, NewStockItem, StockItem, StockItemId, StockStatus, StockThresholds};
pub use ledger::{LedgerStore, apply_adjustment, record_movement};
pub use movement::{
    Direction, MovementId, MovementRequest, SourceKind, SourceRef, StockMovement, unreversed,
};
pub use statistics::{DailyStockStatistics, daily_statistics};
pub use stocktake::{StockTake, StockTakeId, StockTakeLine, StockTakeOutcome, StockTakeStatus};
