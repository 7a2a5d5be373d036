//! Physical counts reconciled into the ledger.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use millerp_core::DomainError;
use millerp_events::{EventBus, EventEnvelope};
use millerp_inventory::{
    InventoryEvent, LedgerStore, SourceKind, SourceRef, StockItemId, StockTake, StockTakeConfirmed,
    StockTakeId, apply_adjustment,
};

use super::ErpService;
use crate::error::ServiceResult;

impl<B> ErpService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create_stocktake(&self, number: &str, take_date: NaiveDate) -> ServiceResult<StockTake> {
        self.execute("create_stocktake", |tables, at| {
            let number = number.trim();
            if tables.stocktakes.iter().any(|s| s.number() == number) {
                return Err(DomainError::conflict(format!("stocktake {number} already exists")));
            }
            let take = StockTake::create(StockTakeId::generate(), number, take_date, at)?;
            tables.stocktakes.insert(take.clone());
            Ok(take)
        })
    }

    /// Count one material; the system quantity is snapshotted now.
    pub fn count_material(
        &self,
        id: StockTakeId,
        material_id: StockItemId,
        counted: Decimal,
        notes: &str,
    ) -> ServiceResult<StockTake> {
        self.execute("count_material", |tables, _| {
            let material = tables.item(material_id)?;
            let mut take = tables.stocktake(id)?.clone();
            take.add_line(material, counted, notes)?;
            tables.stocktakes.insert(take.clone());
            Ok(take)
        })
    }

    /// Confirm the count: each non-zero difference is recorded as an
    /// `adjust` fact and resolved into an `in` or `out` movement.
    pub fn confirm_stocktake(&self, id: StockTakeId) -> ServiceResult<StockTake> {
        self.execute("confirm_stocktake", |tables, at| {
            let mut take = tables.stocktake(id)?.clone();
            take.confirm()?;

            let source = SourceRef::new(SourceKind::StockTake, id);
            for line in take.adjustments() {
                let movements = apply_adjustment(
                    tables,
                    line.material_id,
                    line.difference,
                    take.number(),
                    Some(source.line(line.line_no)),
                    at,
                )?;
                for movement in &movements {
                    tables.announce(movement)?;
                }
            }

            tables.stocktakes.insert(take.clone());
            tables.emit(
                id.aggregate_id(),
                "inventory.stocktake",
                InventoryEvent::StockTakeConfirmed(StockTakeConfirmed {
                    stocktake_id: id,
                    number: take.number().to_string(),
                    outcome: take.outcome(),
                    total_difference: take.total_difference(),
                    occurred_at: at,
                }),
            )?;
            tracing::info!(
                stocktake = take.number(),
                outcome = ?take.outcome(),
                total_difference = %take.total_difference(),
                "stocktake confirmed"
            );
            Ok(take)
        })
    }

    pub fn cancel_stocktake(&self, id: StockTakeId) -> ServiceResult<StockTake> {
        self.execute("cancel_stocktake", |tables, _| {
            let mut take = tables.stocktake(id)?.clone();
            take.cancel()?;
            tables.stocktakes.insert(take.clone());
            Ok(take)
        })
    }

    pub fn stocktake(&self, id: StockTakeId) -> ServiceResult<StockTake> {
        self.query(|tables| tables.stocktake(id).cloned())
    }
}
