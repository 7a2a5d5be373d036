use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_events::Event;
use millerp_inventory::{BatchId, StockItemId};

use crate::order::{ProductionOrderId, ProductionStatus};
use crate::progress::ProgressId;

/// One batch drawn at production start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedBatch {
    pub material_id: StockItemId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: Decimal,
}

/// Event: ProductionStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionStatusChanged {
    pub order_id: ProductionOrderId,
    pub order_number: String,
    pub from: ProductionStatus,
    pub to: ProductionStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialsConsumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialsConsumed {
    pub order_id: ProductionOrderId,
    pub batches: Vec<ConsumedBatch>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProgressRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecorded {
    pub order_id: ProductionOrderId,
    pub progress_id: ProgressId,
    pub quantity: Decimal,
    pub accumulated: Decimal,
    pub progress: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProgressCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCancelled {
    pub order_id: ProductionOrderId,
    pub progress_id: ProgressId,
    pub accumulated: Decimal,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProcessesScheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessesScheduled {
    pub order_id: ProductionOrderId,
    pub steps: usize,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionEvent {
    ProductionStatusChanged(ProductionStatusChanged),
    MaterialsConsumed(MaterialsConsumed),
    ProgressRecorded(ProgressRecorded),
    ProgressCancelled(ProgressCancelled),
    ProcessesScheduled(ProcessesScheduled),
}

impl Event for ProductionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductionEvent::ProductionStatusChanged(_) => "production.order.status_changed",
            ProductionEvent::MaterialsConsumed(_) => "production.order.materials_consumed",
            ProductionEvent::ProgressRecorded(_) => "production.progress.recorded",
            ProductionEvent::ProgressCancelled(_) => "production.progress.cancelled",
            ProductionEvent::ProcessesScheduled(_) => "production.order.processes_scheduled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductionEvent::ProductionStatusChanged(e) => e.occurred_at,
            ProductionEvent::MaterialsConsumed(e) => e.occurred_at,
            ProductionEvent::ProgressRecorded(e) => e.occurred_at,
            ProductionEvent::ProgressCancelled(e) => e.occurred_at,
            ProductionEvent::ProcessesScheduled(e) => e.occurred_at,
        }
    }
}
