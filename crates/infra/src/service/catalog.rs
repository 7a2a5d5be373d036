//! Catalog, ledger queries and batch housekeeping.

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use millerp_core::{DomainError, Entity};
use millerp_events::{EventBus, EventEnvelope};
use millerp_inventory::{
    BatchExpired, BatchId, DailyStockStatistics, InventoryEvent, ItemKind, ItemRegistered,
    LedgerStore, MaterialBatch, MovementRequest, NewStockItem, StockItem, StockItemId,
    StockMovement, StockStatus, daily_statistics,
};
use millerp_production::{WeightEstimate, WeightLine, estimate_material_weight};

use super::ErpService;
use crate::error::ServiceResult;
use crate::store::Tables;

/// Whether anything in the system still points at `item_id`.
fn is_referenced(tables: &Tables, item_id: StockItemId) -> bool {
    tables.movements.iter().any(|m| m.item_id() == item_id)
        || tables.batches.iter().any(|b| b.material_id() == item_id)
        || tables
            .purchases
            .iter()
            .any(|p| p.lines().iter().any(|l| l.material_id == item_id))
        || tables.production_orders.iter().any(|o| {
            o.product_id() == item_id || o.requirements().iter().any(|r| r.material_id == item_id)
        })
        || tables
            .outbounds
            .iter()
            .any(|o| o.lines().iter().any(|l| l.product_id == item_id))
        || tables
            .stocktakes
            .iter()
            .any(|s| s.lines().iter().any(|l| l.material_id == item_id))
}

impl<B> ErpService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Register a material or product. Codes are unique per kind.
    pub fn register_item(&self, input: NewStockItem) -> ServiceResult<StockItem> {
        self.execute("register_item", |tables, at| {
            let code = input.code.trim();
            if tables
                .items
                .iter()
                .any(|i| i.kind() == input.kind && i.code() == code)
            {
                return Err(DomainError::conflict(format!(
                    "{} code {code} is already registered",
                    input.kind
                )));
            }

            let item = StockItem::create(StockItemId::generate(), input.clone(), at)?;
            tables.items.insert(item.clone());
            tables.emit(
                item.id_typed().aggregate_id(),
                "inventory.item",
                InventoryEvent::ItemRegistered(ItemRegistered {
                    item_id: item.id_typed(),
                    kind: item.kind(),
                    code: item.code().to_string(),
                    occurred_at: at,
                }),
            )?;
            tracing::info!(item = %item.label(), kind = %item.kind(), "item registered");
            Ok(item)
        })
    }

    /// Hide an item from new documents; its history stays intact.
    pub fn deactivate_item(&self, id: StockItemId) -> ServiceResult<StockItem> {
        self.execute("deactivate_item", |tables, _| {
            let item = tables.item_mut(id)?;
            item.deactivate();
            Ok(item.clone())
        })
    }

    /// Delete an item that no movement, batch or document references.
    pub fn delete_item(&self, id: StockItemId) -> ServiceResult<()> {
        self.execute("delete_item", |tables, _| {
            let label = tables.item(id)?.label();
            if is_referenced(tables, id) {
                return Err(DomainError::conflict(format!(
                    "{label} has stock history or open documents and cannot be deleted"
                )));
            }
            tables.items.remove(id);
            tracing::info!(item = %label, "item deleted");
            Ok(())
        })
    }

    pub fn item(&self, id: StockItemId) -> ServiceResult<StockItem> {
        self.query(|tables| tables.item(id).cloned())
    }

    pub fn items(&self, kind: Option<ItemKind>) -> ServiceResult<Vec<StockItem>> {
        self.query(|tables| {
            Ok(tables
                .items
                .iter()
                .filter(|i| kind.is_none_or(|k| i.kind() == k))
                .cloned()
                .collect())
        })
    }

    /// Post a manual movement (opening balances, scrap, corrections).
    ///
    /// Reversal links, document sources and inbound batches are refused:
    /// only order transitions create those.
    pub fn post_movement(&self, request: MovementRequest) -> ServiceResult<StockMovement> {
        self.execute("post_movement", |tables, at| {
            request.ensure_manual()?;
            let movement = tables.record(request.clone(), at)?;
            tracing::info!(
                item = %movement.item_id(),
                direction = %movement.direction(),
                quantity = %movement.quantity(),
                reference = movement.reference(),
                "manual movement posted"
            );
            Ok(movement)
        })
    }

    /// Ledger rows of one item in recording order.
    pub fn movement_history(&self, item_id: StockItemId) -> ServiceResult<Vec<StockMovement>> {
        self.query(|tables| {
            tables.item(item_id)?;
            let mut history: Vec<_> = tables
                .movements
                .iter()
                .filter(|m| m.item_id() == item_id)
                .cloned()
                .collect();
            history.sort_by_key(StockMovement::sequence);
            Ok(history)
        })
    }

    pub fn stock_status(&self, item_id: StockItemId) -> ServiceResult<StockStatus> {
        self.query(|tables| Ok(tables.item(item_id)?.stock_status()))
    }

    /// Active items at or below their warning threshold.
    pub fn stock_alerts(&self) -> ServiceResult<Vec<StockItem>> {
        self.query(|tables| {
            Ok(tables
                .items
                .iter()
                .filter(|i| i.is_active() && i.should_alert())
                .cloned()
                .collect())
        })
    }

    pub fn daily_statistics(
        &self,
        item_id: StockItemId,
        date: NaiveDate,
    ) -> ServiceResult<DailyStockStatistics> {
        self.query(|tables| {
            tables.item(item_id)?;
            Ok(daily_statistics(item_id, date, tables.movements.iter()))
        })
    }

    /// Batches of one material in allocation order (oldest first).
    pub fn batches_of(&self, material_id: StockItemId) -> ServiceResult<Vec<MaterialBatch>> {
        self.query(|tables| {
            tables.item(material_id)?;
            let mut batches: Vec<_> = tables
                .batches
                .iter()
                .filter(|b| b.material_id() == material_id)
                .cloned()
                .collect();
            batches.sort_by_key(|b| (b.production_date(), b.sequence()));
            Ok(batches)
        })
    }

    pub fn set_batch_expiry(
        &self,
        batch_id: BatchId,
        expiry_date: Option<NaiveDate>,
    ) -> ServiceResult<MaterialBatch> {
        self.execute("set_batch_expiry", |tables, _| {
            let batch = tables.batch_mut(batch_id)?;
            batch.set_expiry(expiry_date)?;
            Ok(batch.clone())
        })
    }

    /// Flag every normal batch whose expiry date is before `today`. Expired
    /// batches are skipped by the allocator.
    pub fn expire_batches(&self, today: NaiveDate) -> ServiceResult<Vec<MaterialBatch>> {
        self.execute("expire_batches", |tables, at| {
            let candidates: Vec<BatchId> = tables.batches.iter().map(|b| b.id()).collect();
            let mut expired = Vec::new();
            for id in candidates {
                let batch = tables.batch_mut(id)?;
                if batch.expire(today) {
                    expired.push(batch.clone());
                }
            }
            for batch in &expired {
                tables.emit(
                    batch.material_id().aggregate_id(),
                    "inventory.item",
                    InventoryEvent::BatchExpired(BatchExpired {
                        batch_id: batch.id_typed(),
                        batch_number: batch.batch_number().to_string(),
                        remaining: batch.remaining(),
                        occurred_at: at,
                    }),
                )?;
            }
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), %today, "batches expired");
            }
            Ok(expired)
        })
    }

    /// Raw material weight needed for the given product quantities.
    pub fn estimate_material_weight(&self, lines: &[WeightLine]) -> ServiceResult<WeightEstimate> {
        self.query(|tables| Ok(estimate_material_weight(lines, |id| tables.items.get(id))))
    }
}
