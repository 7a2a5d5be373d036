//! The stock ledger primitive every order transition goes through.
//!
//! A movement is validated completely before anything is written, so a
//! rejected movement leaves the store untouched. Atomicity across several
//! movements is the caller's transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use millerp_core::{DomainError, DomainResult, Quantity};

use crate::batch::{BatchId, MaterialBatch};
use crate::item::{StockItem, StockItemId};
use crate::movement::{Direction, MovementId, MovementRequest, SourceRef, StockMovement};

/// Storage view the ledger needs: items, batches and the movement log.
pub trait LedgerStore {
    fn item(&self, id: StockItemId) -> DomainResult<&StockItem>;

    fn item_mut(&mut self, id: StockItemId) -> DomainResult<&mut StockItem>;

    fn batch(&self, id: BatchId) -> DomainResult<&MaterialBatch>;

    fn batch_mut(&mut self, id: BatchId) -> DomainResult<&mut MaterialBatch>;

    /// Total quantity of `out` movements referencing the batch.
    fn batch_outflow(&self, id: BatchId) -> Decimal;

    /// Store-wide, strictly increasing sequence.
    fn next_sequence(&mut self) -> u64;

    fn insert_movement(&mut self, movement: StockMovement);
}

/// Append one movement and apply its effect to the stock counter (and batch).
pub fn record_movement<S>(
    store: &mut S,
    request: MovementRequest,
    at: DateTime<Utc>,
) -> DomainResult<StockMovement>
where
    S: LedgerStore + ?Sized,
{
    let quantity = request.quantity;
    let item = store.item(request.item_id)?;
    let unit = item.unit().to_string();
    let label = item.label();

    if request.direction == Direction::Out {
        item.ensure_available(quantity)?;
    }

    if let Some(batch_id) = request.batch_id {
        let batch = store.batch(batch_id)?;
        if batch.material_id() != request.item_id {
            return Err(DomainError::validation(format!(
                "batch {} does not belong to {label}",
                batch.batch_number()
            )));
        }
        if request.direction == Direction::Out && batch.remaining() < quantity.value() {
            return Err(DomainError::InsufficientBatchStock {
                material: label,
                shortfall: quantity.value() - batch.remaining(),
            });
        }
    }

    let sequence = store.next_sequence();
    let movement = StockMovement::from_request(MovementId::generate(), request, unit, sequence, at);

    match movement.direction() {
        Direction::In => store.item_mut(movement.item_id())?.increase(quantity),
        Direction::Out => store.item_mut(movement.item_id())?.decrease(quantity)?,
        Direction::Adjust => {}
    }
    store.insert_movement(movement.clone());

    if let (Direction::Out, Some(batch_id)) = (movement.direction(), movement.batch_id()) {
        let consumed = store.batch_outflow(batch_id);
        store.batch_mut(batch_id)?.recompute(consumed)?;
    }

    Ok(movement)
}

/// Record an inert `adjust` fact for a counted `difference` and resolve it
/// into the matching `in` (surplus) or `out` (shortage) movement.
///
/// A zero difference records nothing.
pub fn apply_adjustment<S>(
    store: &mut S,
    item_id: StockItemId,
    difference: Decimal,
    reference: &str,
    source: Option<SourceRef>,
    at: DateTime<Utc>,
) -> DomainResult<Vec<StockMovement>>
where
    S: LedgerStore + ?Sized,
{
    let Some(quantity) = Quantity::positive(difference.abs()) else {
        return Ok(Vec::new());
    };

    let direction = if difference > Decimal::ZERO {
        Direction::In
    } else {
        Direction::Out
    };

    let mut fact = MovementRequest::new(item_id, Direction::Adjust, quantity, reference)
        .notes(format!("counted difference {difference}"));
    let mut resolution =
        MovementRequest::new(item_id, direction, quantity, reference).notes("stock adjustment");
    if let Some(source) = source {
        fact = fact.source(source);
        resolution = resolution.source(source);
    }

    let fact = record_movement(store, fact, at)?;
    let resolution = record_movement(store, resolution, at)?;
    Ok(vec![fact, resolution])
}
