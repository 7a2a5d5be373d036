use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_events::Event;

use crate::batch::BatchId;
use crate::item::{ItemKind, StockItemId, StockStatus};
use crate::movement::{Direction, MovementId, StockMovement};
use crate::stocktake::{StockTakeId, StockTakeOutcome};

/// Event: ItemRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub item_id: StockItemId,
    pub kind: ItemKind,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved.
///
/// Carries the counter value after the movement so consumers can raise alerts
/// without reading the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub movement_id: MovementId,
    pub item_id: StockItemId,
    pub direction: Direction,
    pub quantity: Decimal,
    pub reference: String,
    pub stock_after: Decimal,
    pub status_after: StockStatus,
    pub occurred_at: DateTime<Utc>,
}

impl StockMoved {
    pub fn from_movement(movement: &StockMovement, stock_after: Decimal, status_after: StockStatus) -> Self {
        Self {
            movement_id: movement.id_typed(),
            item_id: movement.item_id(),
            direction: movement.direction(),
            quantity: movement.quantity().value(),
            reference: movement.reference().to_string(),
            stock_after,
            status_after,
            occurred_at: movement.created_at(),
        }
    }
}

/// Event: BatchOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOpened {
    pub batch_id: BatchId,
    pub material_id: StockItemId,
    pub batch_number: String,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchExpired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExpired {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub remaining: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockTakeConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakeConfirmed {
    pub stocktake_id: StockTakeId,
    pub number: String,
    pub outcome: StockTakeOutcome,
    pub total_difference: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemRegistered(ItemRegistered),
    StockMoved(StockMoved),
    BatchOpened(BatchOpened),
    BatchExpired(BatchExpired),
    StockTakeConfirmed(StockTakeConfirmed),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemRegistered(_) => "inventory.item.registered",
            InventoryEvent::StockMoved(_) => "inventory.stock.moved",
            InventoryEvent::BatchOpened(_) => "inventory.batch.opened",
            InventoryEvent::BatchExpired(_) => "inventory.batch.expired",
            InventoryEvent::StockTakeConfirmed(_) => "inventory.stocktake.confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemRegistered(e) => e.occurred_at,
            InventoryEvent::StockMoved(e) => e.occurred_at,
            InventoryEvent::BatchOpened(e) => e.occurred_at,
            InventoryEvent::BatchExpired(e) => e.occurred_at,
            InventoryEvent::StockTakeConfirmed(e) => e.occurred_at,
        }
    }
}
