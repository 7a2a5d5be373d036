use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use millerp_core::{AggregateId, DomainError, DomainResult};
use millerp_events::{Event, EventEnvelope};
use millerp_inventory::{
    BatchId, Direction, InventoryEvent, LedgerStore, MaterialBatch, MovementRequest, StockItem,
    StockItemId, StockMoved, StockMovement, StockTake, StockTakeId, record_movement,
};
use millerp_production::{
    ProcessSchedule, ProcessStep, ProductionMaterial, ProductionOrder, ProductionOrderId,
    ProductionProgress,
};
use millerp_purchasing::{PurchaseOrder, PurchaseOrderId};
use millerp_sales::{OutboundId, ProductOutbound, SalesOrder, SalesOrderId};

use super::Table;
use super::table::Journal;

/// Every table of the system plus its counters and the outbox of the
/// running transaction.
#[derive(Debug, Default)]
pub struct Tables {
    pub items: Table<StockItem>,
    pub movements: Table<StockMovement>,
    pub batches: Table<MaterialBatch>,
    pub purchases: Table<PurchaseOrder>,
    pub sales_orders: Table<SalesOrder>,
    pub production_orders: Table<ProductionOrder>,
    pub progress: Table<ProductionProgress>,
    pub consumption: Table<ProductionMaterial>,
    pub process_steps: Table<ProcessStep>,
    pub schedules: Table<ProcessSchedule>,
    pub outbounds: Table<ProductOutbound>,
    pub stocktakes: Table<StockTake>,
    sequence: u64,
    event_sequence: u64,
    outbox: Vec<EventEnvelope<JsonValue>>,
}

/// Counter values at the start of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    sequence: u64,
    event_sequence: u64,
}

fn missing(what: &str, id: impl core::fmt::Display) -> DomainError {
    DomainError::not_found(format!("{what} {id}"))
}

impl Tables {
    pub fn purchase(&self, id: PurchaseOrderId) -> DomainResult<&PurchaseOrder> {
        self.purchases.get(id).ok_or_else(|| missing("purchase order", id))
    }

    pub fn sales_order(&self, id: SalesOrderId) -> DomainResult<&SalesOrder> {
        self.sales_orders.get(id).ok_or_else(|| missing("sales order", id))
    }

    pub fn production_order(&self, id: ProductionOrderId) -> DomainResult<&ProductionOrder> {
        self.production_orders
            .get(id)
            .ok_or_else(|| missing("production order", id))
    }

    pub fn outbound(&self, id: OutboundId) -> DomainResult<&ProductOutbound> {
        self.outbounds.get(id).ok_or_else(|| missing("outbound", id))
    }

    pub fn stocktake(&self, id: StockTakeId) -> DomainResult<&StockTake> {
        self.stocktakes.get(id).ok_or_else(|| missing("stocktake", id))
    }

    /// Progress records of one order, oldest first.
    pub fn progress_of(&self, order_id: ProductionOrderId) -> Vec<&ProductionProgress> {
        let mut history: Vec<_> = self
            .progress
            .iter()
            .filter(|p| p.order_id() == order_id)
            .collect();
        history.sort_by_key(|p| p.sequence());
        history
    }

    /// Process steps in routing order.
    pub fn routing(&self) -> Vec<&ProcessStep> {
        let mut steps: Vec<_> = self.process_steps.iter().collect();
        steps.sort_by_key(|s| s.sequence());
        steps
    }

    /// Planned windows of one order, earliest first.
    pub fn schedule_of(&self, order_id: ProductionOrderId) -> Vec<&ProcessSchedule> {
        let mut plan: Vec<_> = self
            .schedules
            .iter()
            .filter(|s| s.order_id == order_id)
            .collect();
        plan.sort_by_key(|s| (s.planned_start, s.sequence));
        plan
    }

    /// Record a movement through the ledger and queue its `StockMoved` event.
    pub fn record(&mut self, request: MovementRequest, at: DateTime<Utc>) -> DomainResult<StockMovement> {
        let movement = record_movement(self, request, at)?;
        self.announce(&movement)?;
        Ok(movement)
    }

    /// Queue the `StockMoved` event for a movement already in the ledger.
    pub fn announce(&mut self, movement: &StockMovement) -> DomainResult<()> {
        let item = self.item(movement.item_id())?;
        let event = StockMoved::from_movement(movement, item.stock(), item.stock_status());
        self.emit(
            movement.item_id().aggregate_id(),
            "inventory.item",
            InventoryEvent::StockMoved(event),
        )
    }

    /// Queue a domain event; it is published only if the transaction commits.
    pub fn emit<E>(&mut self, aggregate_id: AggregateId, aggregate_type: &str, event: E) -> DomainResult<()>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(&event)
            .map_err(|e| DomainError::invariant(format!("event payload not serializable: {e}")))?;
        self.event_sequence += 1;
        self.outbox.push(EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            aggregate_type,
            event.event_type(),
            event.occurred_at(),
            self.event_sequence,
            payload,
        ));
        Ok(())
    }

    fn journals(&mut self) -> [&mut dyn Journal; 12] {
        [
            &mut self.items,
            &mut self.movements,
            &mut self.batches,
            &mut self.purchases,
            &mut self.sales_orders,
            &mut self.production_orders,
            &mut self.progress,
            &mut self.consumption,
            &mut self.process_steps,
            &mut self.schedules,
            &mut self.outbounds,
            &mut self.stocktakes,
        ]
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            sequence: self.sequence,
            event_sequence: self.event_sequence,
        }
    }

    /// Rows touched by the running transaction.
    pub(crate) fn changes(&mut self) -> usize {
        self.journals().iter().map(|j| j.changes()).sum()
    }

    /// Keep every change since the checkpoint and hand over the queued events.
    pub(crate) fn commit(&mut self) -> Vec<EventEnvelope<JsonValue>> {
        for journal in self.journals() {
            journal.commit();
        }
        std::mem::take(&mut self.outbox)
    }

    /// Undo every change since `checkpoint` and drop the queued events.
    pub(crate) fn rollback(&mut self, checkpoint: Checkpoint) {
        for journal in self.journals() {
            journal.rollback();
        }
        self.sequence = checkpoint.sequence;
        self.event_sequence = checkpoint.event_sequence;
        self.outbox.clear();
    }
}

impl LedgerStore for Tables {
    fn item(&self, id: StockItemId) -> DomainResult<&StockItem> {
        self.items.get(id).ok_or_else(|| missing("stock item", id))
    }

    fn item_mut(&mut self, id: StockItemId) -> DomainResult<&mut StockItem> {
        self.items.get_mut(id).ok_or_else(|| missing("stock item", id))
    }

    fn batch(&self, id: BatchId) -> DomainResult<&MaterialBatch> {
        self.batches.get(id).ok_or_else(|| missing("batch", id))
    }

    fn batch_mut(&mut self, id: BatchId) -> DomainResult<&mut MaterialBatch> {
        self.batches.get_mut(id).ok_or_else(|| missing("batch", id))
    }

    fn batch_outflow(&self, id: BatchId) -> Decimal {
        self.movements
            .iter()
            .filter(|m| m.direction() == Direction::Out && m.batch_id() == Some(id))
            .map(|m| m.quantity().value())
            .sum()
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn insert_movement(&mut self, movement: StockMovement) {
        self.movements.insert(movement);
    }
}
