//! First-in-first-out batch allocation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Quantity};

use crate::batch::{BatchId, MaterialBatch};
use crate::item::StockItem;

/// Quantity to take from one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: Quantity,
}

/// Plan consumption of `required` units of `material`, oldest production date first.
///
/// Only normal batches with remaining stock are candidates; batches produced on
/// the same day are taken in the order they were opened. This is a pure plan:
/// the caller records one ledger movement per allocation.
pub fn allocate<'a>(
    material: &StockItem,
    batches: impl IntoIterator<Item = &'a MaterialBatch>,
    required: Quantity,
) -> DomainResult<Vec<Allocation>> {
    let mut candidates: Vec<&MaterialBatch> = batches
        .into_iter()
        .filter(|b| b.material_id() == material.id_typed() && b.is_allocatable())
        .collect();
    candidates.sort_by_key(|b| (b.production_date(), b.sequence()));

    let mut still_needed = required.value();
    let mut plan = Vec::new();

    for batch in candidates {
        if still_needed.is_zero() {
            break;
        }
        let take = batch.remaining().min(still_needed);
        if let Some(quantity) = Quantity::positive(take) {
            plan.push(Allocation {
                batch_id: batch.id_typed(),
                batch_number: batch.batch_number().to_string(),
                quantity,
            });
            still_needed -= take;
        }
    }

    if still_needed > Decimal::ZERO {
        return Err(DomainError::InsufficientBatchStock {
            material: material.label(),
            shortfall: still_needed,
        });
    }

    Ok(plan)
}
