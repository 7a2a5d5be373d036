use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity, Quantity};

use crate::order::ProductionOrderId;

millerp_core::typed_id!(
    /// Production progress record identifier.
    ProgressId
);

/// `accumulated / planned * 100`, rounded to two decimal places.
pub fn percentage(accumulated: Decimal, planned: Quantity) -> Decimal {
    (accumulated / planned.value() * Decimal::ONE_HUNDRED).round_dp(2)
}

/// One incremental production report.
///
/// `accumulated` of record *i* is `accumulated` of record *i-1* plus `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionProgress {
    id: ProgressId,
    order_id: ProductionOrderId,
    /// 1-based position within the order's history.
    sequence: u32,
    record_date: NaiveDate,
    quantity: Quantity,
    accumulated: Decimal,
    progress: Decimal,
    notes: String,
    created_at: DateTime<Utc>,
}

impl ProductionProgress {
    pub(crate) fn next(
        id: ProgressId,
        order_id: ProductionOrderId,
        planned: Quantity,
        latest: Option<&ProductionProgress>,
        quantity: Quantity,
        notes: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if let Some(latest) = latest.filter(|l| l.order_id != order_id) {
            return Err(DomainError::invariant(format!(
                "progress record {} belongs to another order",
                latest.id
            )));
        }

        let (sequence, previous) = latest.map_or((1, Decimal::ZERO), |l| (l.sequence + 1, l.accumulated));
        let accumulated = previous + quantity.value();

        Ok(Self {
            id,
            order_id,
            sequence,
            record_date: at.date_naive(),
            quantity,
            accumulated,
            progress: percentage(accumulated, planned),
            notes: notes.into(),
            created_at: at,
        })
    }

    pub fn id_typed(&self) -> ProgressId {
        self.id
    }

    pub fn order_id(&self) -> ProductionOrderId {
        self.order_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn record_date(&self) -> NaiveDate {
        self.record_date
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn accumulated(&self) -> Decimal {
        self.accumulated
    }

    pub fn progress(&self) -> Decimal {
        self.progress
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for ProductionProgress {
    type Id = ProgressId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
