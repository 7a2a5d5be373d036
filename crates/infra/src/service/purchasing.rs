//! Purchase orders: drafting, receipt into batches, and compensation.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use millerp_core::{DomainError, DomainResult, Quantity};
use millerp_events::{EventBus, EventEnvelope};
use millerp_inventory::{
    BatchId, BatchOpened, Direction, InventoryEvent, ItemKind, LedgerStore, MaterialBatch,
    MovementRequest, NewBatch, SourceKind, SourceRef, StockItemId, StockMovement, unreversed,
};
use millerp_purchasing::{
    NewPurchaseOrder, PurchaseDeleted, PurchaseEvent, PurchaseOrder, PurchaseOrderId,
    PurchaseReceived, PurchaseStatus, PurchaseStatusChanged, ReceiptCancelled, ReceivedLine,
};

use super::ErpService;
use crate::error::ServiceResult;
use crate::store::Tables;

const AGGREGATE: &str = "purchasing.order";

fn receipt_source(id: PurchaseOrderId) -> SourceRef {
    SourceRef::new(SourceKind::Purchase, id)
}

fn live_receipts(tables: &Tables, id: PurchaseOrderId) -> Vec<StockMovement> {
    unreversed(tables.movements.iter(), &receipt_source(id), Direction::In)
        .into_iter()
        .cloned()
        .collect()
}

/// Compensate every live receipt of `order` and drop its batches.
///
/// Refused while any batch has been drawn by production. Returns the numbers
/// of the removed batches.
fn reverse_receipt(tables: &mut Tables, order: &PurchaseOrder, at: DateTime<Utc>) -> DomainResult<Vec<String>> {
    let purchase_id = order.id_typed().aggregate_id();
    let batches: Vec<MaterialBatch> = tables
        .batches
        .iter()
        .filter(|b| b.purchase_id() == purchase_id)
        .cloned()
        .collect();

    let in_use: Vec<String> = batches
        .iter()
        .filter(|b| tables.consumption.iter().any(|c| c.batch_id == b.id_typed()))
        .map(|b| b.batch_number().to_string())
        .collect();
    if !in_use.is_empty() {
        return Err(DomainError::BatchInUse(in_use));
    }

    for receipt in live_receipts(tables, order.id_typed()) {
        tables.record(
            MovementRequest::reversal_of(&receipt, order.purchase_number())
                .notes(format!("receipt of {} cancelled", order.purchase_number())),
            at,
        )?;
    }

    let mut removed = Vec::with_capacity(batches.len());
    for batch in batches {
        tables.batches.remove(batch.id_typed());
        removed.push(batch.batch_number().to_string());
    }
    Ok(removed)
}

impl<B> ErpService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create_purchase(&self, input: NewPurchaseOrder) -> ServiceResult<PurchaseOrder> {
        self.execute("create_purchase", |tables, at| {
            let number = input.purchase_number.trim();
            if tables.purchases.iter().any(|p| p.purchase_number() == number) {
                return Err(DomainError::conflict(format!(
                    "purchase number {number} is already used"
                )));
            }
            let order = PurchaseOrder::create(PurchaseOrderId::generate(), input.clone(), at)?;
            tables.purchases.insert(order.clone());
            tracing::info!(purchase = order.purchase_number(), supplier = order.supplier(), "purchase drafted");
            Ok(order)
        })
    }

    /// Add a material line to a draft; the unit comes from the catalog.
    pub fn add_purchase_line(
        &self,
        id: PurchaseOrderId,
        material_id: StockItemId,
        quantity: Quantity,
        specification: &str,
    ) -> ServiceResult<PurchaseOrder> {
        self.execute("add_purchase_line", |tables, at| {
            let material = tables.item(material_id)?;
            if material.kind() != ItemKind::Material || !material.is_active() {
                return Err(DomainError::validation(format!(
                    "{} is not an active material",
                    material.label()
                )));
            }
            let unit = material.unit().to_string();

            let mut order = tables.purchase(id)?.clone();
            order.add_line(material_id, quantity, unit, specification, at)?;
            tables.purchases.insert(order.clone());
            Ok(order)
        })
    }

    pub fn remove_purchase_line(&self, id: PurchaseOrderId, line_no: u32) -> ServiceResult<PurchaseOrder> {
        self.execute("remove_purchase_line", |tables, at| {
            let mut order = tables.purchase(id)?.clone();
            order.remove_line(line_no, at)?;
            tables.purchases.insert(order.clone());
            Ok(order)
        })
    }

    pub fn submit_purchase(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.change_purchase_status("submit_purchase", id, PurchaseOrder::submit)
    }

    pub fn complete_purchase(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.change_purchase_status("complete_purchase", id, PurchaseOrder::complete)
    }

    pub fn cancel_purchase(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.change_purchase_status("cancel_purchase", id, PurchaseOrder::cancel)
    }

    fn change_purchase_status(
        &self,
        operation: &'static str,
        id: PurchaseOrderId,
        transition: fn(&mut PurchaseOrder, DateTime<Utc>) -> DomainResult<()>,
    ) -> ServiceResult<PurchaseOrder> {
        self.execute(operation, |tables, at| {
            let mut order = tables.purchase(id)?.clone();
            let from = order.status();
            transition(&mut order, at)?;
            tables.purchases.insert(order.clone());
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                PurchaseEvent::PurchaseStatusChanged(PurchaseStatusChanged {
                    order_id: id,
                    purchase_number: order.purchase_number().to_string(),
                    from,
                    to: order.status(),
                    occurred_at: at,
                }),
            )?;
            tracing::info!(purchase = order.purchase_number(), %from, to = %order.status(), "purchase status changed");
            Ok(order)
        })
    }

    /// Receive a pending purchase: one batch and one `in` movement per line.
    pub fn receive_purchase(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.execute("receive_purchase", |tables, at| {
            let mut order = tables.purchase(id)?.clone();
            order.ensure_receivable(!live_receipts(tables, id).is_empty())?;
            order.receive(at)?;

            let number = order.purchase_number().to_string();
            let mut received = Vec::with_capacity(order.lines().len());
            for line in order.lines() {
                let batch = MaterialBatch::open(
                    BatchId::generate(),
                    NewBatch {
                        material_id: line.material_id,
                        purchase_id: id.aggregate_id(),
                        purchase_number: number.clone(),
                        line_no: line.line_no,
                        quantity: line.quantity,
                        production_date: at.date_naive(),
                        expiry_date: None,
                    },
                    tables.next_sequence(),
                )?;
                let batch_id = batch.id_typed();
                tables.batches.insert(batch.clone());
                tables.emit(
                    line.material_id.aggregate_id(),
                    "inventory.item",
                    InventoryEvent::BatchOpened(BatchOpened {
                        batch_id,
                        material_id: line.material_id,
                        batch_number: batch.batch_number().to_string(),
                        quantity: line.quantity.value(),
                        occurred_at: at,
                    }),
                )?;

                tables.record(
                    MovementRequest::inbound(line.material_id, line.quantity, number.as_str())
                        .batch(batch_id)
                        .source(receipt_source(id).line(line.line_no))
                        .notes(format!("received on purchase {number}")),
                    at,
                )?;
                received.push(ReceivedLine {
                    line_no: line.line_no,
                    material_id: line.material_id,
                    batch_id,
                    quantity: line.quantity.value(),
                });
            }

            tables.purchases.insert(order.clone());
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                PurchaseEvent::PurchaseReceived(PurchaseReceived {
                    order_id: id,
                    purchase_number: number.clone(),
                    lines: received,
                    occurred_at: at,
                }),
            )?;
            tracing::info!(purchase = %number, lines = order.lines().len(), "purchase received");
            Ok(order)
        })
    }

    /// Undo a receipt: compensating `out` movements, batches removed, status
    /// back to pending. Refused once production drew from any of its batches.
    pub fn cancel_receive(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.execute("cancel_receive", |tables, at| {
            let mut order = tables.purchase(id)?.clone();
            order.cancel_receive(at)?;
            let removed = reverse_receipt(tables, &order, at)?;

            tables.purchases.insert(order.clone());
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                PurchaseEvent::ReceiptCancelled(ReceiptCancelled {
                    order_id: id,
                    purchase_number: order.purchase_number().to_string(),
                    removed_batches: removed,
                    occurred_at: at,
                }),
            )?;
            tracing::info!(purchase = order.purchase_number(), "receipt cancelled");
            Ok(order)
        })
    }

    /// Delete a purchase in any state. Live receipts are compensated first;
    /// the ledger keeps both the receipts and their reversals.
    pub fn delete_purchase(&self, id: PurchaseOrderId) -> ServiceResult<()> {
        self.execute("delete_purchase", |tables, at| {
            let order = tables.purchase(id)?.clone();
            let reversed = !live_receipts(tables, id).is_empty()
                || order.status() == PurchaseStatus::Received;
            if reversed {
                reverse_receipt(tables, &order, at)?;
            }

            tables.purchases.remove(id);
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                PurchaseEvent::PurchaseDeleted(PurchaseDeleted {
                    order_id: id,
                    purchase_number: order.purchase_number().to_string(),
                    reversed_receipt: reversed,
                    occurred_at: at,
                }),
            )?;
            tracing::info!(purchase = order.purchase_number(), reversed, "purchase deleted");
            Ok(())
        })
    }

    pub fn purchase(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.query(|tables| tables.purchase(id).cloned())
    }

    pub fn purchases(&self) -> ServiceResult<Vec<PurchaseOrder>> {
        self.query(|tables| Ok(tables.purchases.iter().cloned().collect()))
    }
}
