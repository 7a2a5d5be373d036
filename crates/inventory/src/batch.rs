use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{AggregateId, DomainError, DomainResult, Entity, Quantity};

use crate::item::StockItemId;

millerp_core::typed_id!(
    /// Material batch identifier.
    BatchId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Normal,
    Expired,
    Depleted,
}

impl core::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            BatchStatus::Normal => "normal",
            BatchStatus::Expired => "expired",
            BatchStatus::Depleted => "depleted",
        })
    }
}

/// Batch number for the batch created by one purchase line.
pub fn batch_number(purchase_number: &str, line_no: u32) -> String {
    format!("{purchase_number}-{line_no}")
}

/// Everything needed to open a batch from a received purchase line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBatch {
    pub material_id: StockItemId,
    pub purchase_id: AggregateId,
    pub purchase_number: String,
    pub line_no: u32,
    pub quantity: Quantity,
    pub production_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

/// A tranche of material from one purchase line.
///
/// `remaining` is a projection: `initial - Σ out movements referencing the batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialBatch {
    id: BatchId,
    material_id: StockItemId,
    batch_number: String,
    purchase_id: AggregateId,
    line_no: u32,
    production_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
    initial: Quantity,
    remaining: Decimal,
    status: BatchStatus,
    /// Tie-breaker for batches produced on the same day.
    sequence: u64,
}

impl MaterialBatch {
    pub fn open(id: BatchId, input: NewBatch, sequence: u64) -> DomainResult<Self> {
        if let Some(expiry) = input.expiry_date.filter(|e| *e < input.production_date) {
            return Err(DomainError::validation(format!(
                "batch expiry {expiry} precedes production date {}",
                input.production_date
            )));
        }

        Ok(Self {
            id,
            material_id: input.material_id,
            batch_number: batch_number(&input.purchase_number, input.line_no),
            purchase_id: input.purchase_id,
            line_no: input.line_no,
            production_date: input.production_date,
            expiry_date: input.expiry_date,
            initial: input.quantity,
            remaining: input.quantity.value(),
            status: BatchStatus::Normal,
            sequence,
        })
    }

    pub fn id_typed(&self) -> BatchId {
        self.id
    }

    pub fn material_id(&self) -> StockItemId {
        self.material_id
    }

    pub fn batch_number(&self) -> &str {
        &self.batch_number
    }

    pub fn purchase_id(&self) -> AggregateId {
        self.purchase_id
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn production_date(&self) -> NaiveDate {
        self.production_date
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn initial(&self) -> Quantity {
        self.initial
    }

    pub fn remaining(&self) -> Decimal {
        self.remaining
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Usable by the allocator.
    pub fn is_allocatable(&self) -> bool {
        self.status == BatchStatus::Normal && self.remaining > Decimal::ZERO
    }

    /// Recompute `remaining` from the total consumed out of this batch.
    pub(crate) fn recompute(&mut self, consumed: Decimal) -> DomainResult<()> {
        let remaining = self.initial.value() - consumed;
        if remaining < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "batch {} over-consumed by {}",
                self.batch_number, -remaining
            )));
        }
        self.remaining = remaining;
        if remaining.is_zero() {
            self.status = BatchStatus::Depleted;
        } else if self.status == BatchStatus::Depleted {
            self.status = BatchStatus::Normal;
        }
        Ok(())
    }

    pub fn set_expiry(&mut self, expiry_date: Option<NaiveDate>) -> DomainResult<()> {
        if let Some(expiry) = expiry_date.filter(|e| *e < self.production_date) {
            return Err(DomainError::validation(format!(
                "batch expiry {expiry} precedes production date {}",
                self.production_date
            )));
        }
        self.expiry_date = expiry_date;
        Ok(())
    }

    /// Mark a normal batch expired once `today` is past its expiry date.
    /// Returns whether the status changed.
    pub fn expire(&mut self, today: NaiveDate) -> bool {
        match self.expiry_date {
            Some(expiry) if self.status == BatchStatus::Normal && expiry < today => {
                self.status = BatchStatus::Expired;
                true
            }
            _ => false,
        }
    }
}

impl Entity for MaterialBatch {
    type Id = BatchId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
