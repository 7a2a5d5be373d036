use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_events::Event;
use millerp_inventory::StockItemId;

use crate::order::{SalesOrderId, SalesOrderStatus};
use crate::outbound::{OutboundId, OutboundStatus};

/// Event: SalesOrderProjected (status advanced by production).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderProjected {
    pub order_id: SalesOrderId,
    pub order_number: String,
    pub from: SalesOrderStatus,
    pub to: SalesOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OutboundStatusChanged (created / confirmed / cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundStatusChanged {
    pub outbound_id: OutboundId,
    pub outbound_number: String,
    pub status: OutboundStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OutboundLineChanged.
///
/// `quantity` is positive for an added line and negative for a removed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundLineChanged {
    pub outbound_id: OutboundId,
    pub line_no: u32,
    pub product_id: StockItemId,
    pub quantity: Decimal,
    /// Whether the change moved stock (outbound already confirmed).
    pub stock_moved: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesEvent {
    SalesOrderProjected(SalesOrderProjected),
    OutboundStatusChanged(OutboundStatusChanged),
    OutboundLineChanged(OutboundLineChanged),
}

impl Event for SalesEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesEvent::SalesOrderProjected(_) => "sales.order.projected",
            SalesEvent::OutboundStatusChanged(_) => "sales.outbound.status_changed",
            SalesEvent::OutboundLineChanged(_) => "sales.outbound.line_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesEvent::SalesOrderProjected(e) => e.occurred_at,
            SalesEvent::OutboundStatusChanged(e) => e.occurred_at,
            SalesEvent::OutboundLineChanged(e) => e.occurred_at,
        }
    }
}
