use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{AggregateId, DomainError, DomainResult, Entity, Quantity};

use crate::batch::BatchId;
use crate::item::StockItemId;

millerp_core::typed_id!(
    /// Ledger row identifier.
    MovementId
);

/// Movement direction.
///
/// `Adjust` is a recorded-but-inert fact: it never touches the stock counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Adjust,
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Adjust => "adjust",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Purchase,
    Production,
    Outbound,
    StockTake,
}

/// The document (and optionally the line) that caused a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: AggregateId,
    pub line_no: Option<u32>,
}

impl SourceRef {
    pub fn new(kind: SourceKind, id: impl Into<AggregateId>) -> Self {
        Self {
            kind,
            id: id.into(),
            line_no: None,
        }
    }

    pub fn line(mut self, line_no: u32) -> Self {
        self.line_no = Some(line_no);
        self
    }

    /// Same document, ignoring the line.
    pub fn same_document(&self, other: &SourceRef) -> bool {
        self.kind == other.kind && self.id == other.id
    }
}

/// An immutable ledger fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    id: MovementId,
    item_id: StockItemId,
    direction: Direction,
    quantity: Quantity,
    unit: String,
    reference: String,
    notes: String,
    batch_id: Option<BatchId>,
    source: Option<SourceRef>,
    /// The movement this one compensates.
    reverses: Option<MovementId>,
    sequence: u64,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    pub(crate) fn from_request(
        id: MovementId,
        request: MovementRequest,
        unit: String,
        sequence: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            item_id: request.item_id,
            direction: request.direction,
            quantity: request.quantity,
            unit,
            reference: request.reference,
            notes: request.notes,
            batch_id: request.batch_id,
            source: request.source,
            reverses: request.reverses,
            sequence,
            created_at,
        }
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn item_id(&self) -> StockItemId {
        self.item_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    pub fn source(&self) -> Option<SourceRef> {
        self.source
    }

    pub fn reverses(&self) -> Option<MovementId> {
        self.reverses
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Signed effect on the stock counter.
    pub fn stock_effect(&self) -> Decimal {
        match self.direction {
            Direction::In => self.quantity.value(),
            Direction::Out => -self.quantity.value(),
            Direction::Adjust => Decimal::ZERO,
        }
    }

    /// From `source`'s document; when `source` names a line, from that line only.
    pub fn is_from(&self, source: &SourceRef) -> bool {
        self.source.is_some_and(|s| {
            s.same_document(source) && (source.line_no.is_none() || s.line_no == source.line_no)
        })
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Input to [`crate::ledger::record_movement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub item_id: StockItemId,
    pub direction: Direction,
    pub quantity: Quantity,
    pub reference: String,
    pub notes: String,
    pub(crate) batch_id: Option<BatchId>,
    pub(crate) source: Option<SourceRef>,
    pub(crate) reverses: Option<MovementId>,
}

impl MovementRequest {
    pub fn new(
        item_id: StockItemId,
        direction: Direction,
        quantity: Quantity,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            item_id,
            direction,
            quantity,
            reference: reference.into(),
            notes: String::new(),
            batch_id: None,
            source: None,
            reverses: None,
        }
    }

    pub fn inbound(item_id: StockItemId, quantity: Quantity, reference: impl Into<String>) -> Self {
        Self::new(item_id, Direction::In, quantity, reference)
    }

    pub fn outbound(item_id: StockItemId, quantity: Quantity, reference: impl Into<String>) -> Self {
        Self::new(item_id, Direction::Out, quantity, reference)
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    /// Refuse the links only order transitions may set.
    ///
    /// A manual posting compensates nothing, belongs to no document and
    /// never books stock into a batch; an `out` may still name the batch it
    /// is drawn from.
    pub fn ensure_manual(&self) -> DomainResult<()> {
        if let Some(original) = self.reverses {
            return Err(DomainError::validation(format!(
                "a manual movement cannot reverse movement {original}"
            )));
        }
        if self.source.is_some() {
            return Err(DomainError::validation(
                "a manual movement cannot claim an order document as its source",
            ));
        }
        if self.direction == Direction::In && self.batch_id.is_some() {
            return Err(DomainError::validation(
                "a manual receipt cannot be booked into a batch",
            ));
        }
        Ok(())
    }

    /// Compensate `original`: opposite direction, same item and quantity.
    pub fn reversal_of(original: &StockMovement, reference: impl Into<String>) -> Self {
        let direction = match original.direction {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
            Direction::Adjust => Direction::Adjust,
        };
        Self {
            item_id: original.item_id,
            direction,
            quantity: original.quantity,
            reference: reference.into(),
            notes: String::new(),
            batch_id: None,
            source: original.source,
            reverses: Some(original.id),
        }
    }
}

/// Movements from `source` in `direction` that no later movement compensates.
///
/// Used as the idempotency guard for receive/complete and to find what a
/// cancellation still has to reverse.
pub fn unreversed<'a>(
    movements: impl IntoIterator<Item = &'a StockMovement> + Clone,
    source: &SourceRef,
    direction: Direction,
) -> Vec<&'a StockMovement> {
    let reversed: HashSet<MovementId> = movements
        .clone()
        .into_iter()
        .filter_map(StockMovement::reverses)
        .collect();

    movements
        .into_iter()
        .filter(|m| m.direction == direction && m.reverses.is_none() && m.is_from(source))
        .filter(|m| !reversed.contains(&m.id))
        .collect()
}
