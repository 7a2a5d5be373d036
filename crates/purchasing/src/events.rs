use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_events::Event;
use millerp_inventory::{BatchId, StockItemId};

use crate::order::{PurchaseOrderId, PurchaseStatus};

/// One received line and the batch it opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedLine {
    pub line_no: u32,
    pub material_id: StockItemId,
    pub batch_id: BatchId,
    pub quantity: Decimal,
}

/// Event: PurchaseReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceived {
    pub order_id: PurchaseOrderId,
    pub purchase_number: String,
    pub lines: Vec<ReceivedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReceiptCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptCancelled {
    pub order_id: PurchaseOrderId,
    pub purchase_number: String,
    pub removed_batches: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseStatusChanged (submit / complete / cancel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseStatusChanged {
    pub order_id: PurchaseOrderId,
    pub purchase_number: String,
    pub from: PurchaseStatus,
    pub to: PurchaseStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseDeleted {
    pub order_id: PurchaseOrderId,
    pub purchase_number: String,
    /// Whether receipts had to be compensated first.
    pub reversed_receipt: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    PurchaseReceived(PurchaseReceived),
    ReceiptCancelled(ReceiptCancelled),
    PurchaseStatusChanged(PurchaseStatusChanged),
    PurchaseDeleted(PurchaseDeleted),
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseReceived(_) => "purchasing.order.received",
            PurchaseEvent::ReceiptCancelled(_) => "purchasing.order.receipt_cancelled",
            PurchaseEvent::PurchaseStatusChanged(_) => "purchasing.order.status_changed",
            PurchaseEvent::PurchaseDeleted(_) => "purchasing.order.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::PurchaseReceived(e) => e.occurred_at,
            PurchaseEvent::ReceiptCancelled(e) => e.occurred_at,
            PurchaseEvent::PurchaseStatusChanged(e) => e.occurred_at,
            PurchaseEvent::PurchaseDeleted(e) => e.occurred_at,
        }
    }
}
