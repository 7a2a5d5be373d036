use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity};

use crate::item::{ItemKind, StockItem, StockItemId};

millerp_core::typed_id!(
    /// Stocktake (physical count) identifier.
    StockTakeId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockTakeStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl core::fmt::Display for StockTakeStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            StockTakeStatus::Draft => "draft",
            StockTakeStatus::Confirmed => "confirmed",
            StockTakeStatus::Cancelled => "cancelled",
        })
    }
}

/// Overall outcome of a count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockTakeOutcome {
    Profit,
    Loss,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakeLine {
    pub line_no: u32,
    pub material_id: StockItemId,
    /// Ledger stock when the line was added.
    pub system_quantity: Decimal,
    pub counted_quantity: Decimal,
    pub difference: Decimal,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTake {
    id: StockTakeId,
    number: String,
    take_date: NaiveDate,
    status: StockTakeStatus,
    outcome: StockTakeOutcome,
    total_difference: Decimal,
    lines: Vec<StockTakeLine>,
    created_at: DateTime<Utc>,
}

impl StockTake {
    pub fn create(
        id: StockTakeId,
        number: impl Into<String>,
        take_date: NaiveDate,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let number = number.into();
        if number.trim().is_empty() {
            return Err(DomainError::validation("stocktake number cannot be empty"));
        }
        Ok(Self {
            id,
            number,
            take_date,
            status: StockTakeStatus::Draft,
            outcome: StockTakeOutcome::Normal,
            total_difference: Decimal::ZERO,
            lines: Vec::new(),
            created_at: at,
        })
    }

    pub fn id_typed(&self) -> StockTakeId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn take_date(&self) -> NaiveDate {
        self.take_date
    }

    pub fn status(&self) -> StockTakeStatus {
        self.status
    }

    pub fn outcome(&self) -> StockTakeOutcome {
        self.outcome
    }

    pub fn total_difference(&self) -> Decimal {
        self.total_difference
    }

    pub fn lines(&self) -> &[StockTakeLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn ensure_draft(&self, operation: &str) -> DomainResult<()> {
        if self.status != StockTakeStatus::Draft {
            return Err(DomainError::invalid_transition(
                format!("stocktake {}", self.number),
                self.status,
                operation,
            ));
        }
        Ok(())
    }

    /// Add a counted line, snapshotting the material's current ledger stock.
    pub fn add_line(
        &mut self,
        material: &StockItem,
        counted_quantity: Decimal,
        notes: impl Into<String>,
    ) -> DomainResult<u32> {
        self.ensure_draft("add line to")?;
        if material.kind() != ItemKind::Material {
            return Err(DomainError::validation(format!(
                "{} is not a material",
                material.label()
            )));
        }
        if counted_quantity < Decimal::ZERO {
            return Err(DomainError::validation("counted quantity cannot be negative"));
        }
        if self.lines.iter().any(|l| l.material_id == material.id_typed()) {
            return Err(DomainError::conflict(format!(
                "{} is already counted in stocktake {}",
                material.label(),
                self.number
            )));
        }

        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        self.lines.push(StockTakeLine {
            line_no,
            material_id: material.id_typed(),
            system_quantity: material.stock(),
            counted_quantity,
            difference: counted_quantity - material.stock(),
            notes: notes.into(),
        });
        self.calculate_differences();
        Ok(line_no)
    }

    /// Recompute every line difference and classify the take.
    pub fn calculate_differences(&mut self) -> StockTakeOutcome {
        let mut total = Decimal::ZERO;
        for line in &mut self.lines {
            line.difference = line.counted_quantity - line.system_quantity;
            total += line.difference;
        }
        self.total_difference = total;
        self.outcome = if total > Decimal::ZERO {
            StockTakeOutcome::Profit
        } else if total < Decimal::ZERO {
            StockTakeOutcome::Loss
        } else {
            StockTakeOutcome::Normal
        };
        self.outcome
    }

    /// Lines whose difference must be posted to the ledger.
    pub fn adjustments(&self) -> impl Iterator<Item = &StockTakeLine> {
        self.lines.iter().filter(|l| !l.difference.is_zero())
    }

    pub fn confirm(&mut self) -> DomainResult<()> {
        self.ensure_draft("confirm")?;
        if self.lines.is_empty() {
            return Err(DomainError::EmptyOrder(format!("stocktake {}", self.number)));
        }
        self.calculate_differences();
        self.status = StockTakeStatus::Confirmed;
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.ensure_draft("cancel")?;
        self.status = StockTakeStatus::Cancelled;
        Ok(())
    }
}

impl Entity for StockTake {
    type Id = StockTakeId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
