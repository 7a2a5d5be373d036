use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity, MaterialShortage, Quantity};
use millerp_inventory::{StockItem, StockItemId};
use millerp_sales::SalesOrderId;

use crate::progress::{ProductionProgress, ProgressId, percentage};

millerp_core::typed_id!(
    /// Production order identifier.
    ProductionOrderId
);

/// Planned duration when no end date is given.
pub const DEFAULT_PLANNED_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Pending,
    MaterialReady,
    InProduction,
    Completed,
}

impl core::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::MaterialReady => "material_ready",
            ProductionStatus::InProduction => "in_production",
            ProductionStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionAction {
    MaterialReady,
    Start,
    Complete,
    CancelCompletion,
}

impl ProductionAction {
    fn verb(self) -> &'static str {
        match self {
            ProductionAction::MaterialReady => "mark materials ready for",
            ProductionAction::Start => "start",
            ProductionAction::Complete => "complete",
            ProductionAction::CancelCompletion => "cancel completion of",
        }
    }
}

impl ProductionStatus {
    /// The legal transition table. `None` means the action is not allowed.
    pub fn transition(self, action: ProductionAction) -> Option<ProductionStatus> {
        use ProductionAction as A;
        use ProductionStatus as S;

        match (self, action) {
            (S::Pending, A::MaterialReady) => Some(S::MaterialReady),
            (S::MaterialReady, A::Start) => Some(S::InProduction),
            (S::InProduction, A::Complete) => Some(S::Completed),
            (S::Completed, A::CancelCompletion) => Some(S::InProduction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// One bill-of-materials line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_id: StockItemId,
    pub required: Quantity,
    /// Set to `required` once the material is consumed at start.
    pub actual: Decimal,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductionOrder {
    pub order_number: String,
    #[serde(default)]
    pub sales_order_id: Option<SalesOrderId>,
    pub product_id: StockItemId,
    pub planned_quantity: Quantity,
    pub planned_start: NaiveDate,
    #[serde(default)]
    pub planned_end: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub notes: String,
}

/// Aggregate root: ProductionOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    id: ProductionOrderId,
    order_number: String,
    sales_order_id: Option<SalesOrderId>,
    product_id: StockItemId,
    planned_quantity: Quantity,
    completed_quantity: Decimal,
    /// Percentage of the planned quantity, two decimal places.
    progress: Decimal,
    planned_start: NaiveDate,
    planned_end: NaiveDate,
    actual_start: Option<NaiveDate>,
    actual_end: Option<NaiveDate>,
    status: ProductionStatus,
    priority: Priority,
    requirements: Vec<MaterialRequirement>,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductionOrder {
    pub fn create(id: ProductionOrderId, input: NewProductionOrder, at: DateTime<Utc>) -> DomainResult<Self> {
        if input.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        let planned_end = match input.planned_end {
            Some(end) => end,
            None => input
                .planned_start
                .checked_add_days(Days::new(DEFAULT_PLANNED_DAYS))
                .ok_or_else(|| DomainError::validation("planned start date out of range"))?,
        };
        if planned_end < input.planned_start {
            return Err(DomainError::validation("planned end precedes planned start"));
        }

        Ok(Self {
            id,
            order_number: input.order_number.trim().to_string(),
            sales_order_id: input.sales_order_id,
            product_id: input.product_id,
            planned_quantity: input.planned_quantity,
            completed_quantity: Decimal::ZERO,
            progress: Decimal::ZERO,
            planned_start: input.planned_start,
            planned_end,
            actual_start: None,
            actual_end: None,
            status: ProductionStatus::Pending,
            priority: input.priority,
            requirements: Vec::new(),
            notes: input.notes,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> ProductionOrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn sales_order_id(&self) -> Option<SalesOrderId> {
        self.sales_order_id
    }

    pub fn product_id(&self) -> StockItemId {
        self.product_id
    }

    pub fn planned_quantity(&self) -> Quantity {
        self.planned_quantity
    }

    pub fn completed_quantity(&self) -> Decimal {
        self.completed_quantity
    }

    pub fn progress(&self) -> Decimal {
        self.progress
    }

    pub fn planned_start(&self) -> NaiveDate {
        self.planned_start
    }

    pub fn planned_end(&self) -> NaiveDate {
        self.planned_end
    }

    pub fn actual_start(&self) -> Option<NaiveDate> {
        self.actual_start
    }

    pub fn actual_end(&self) -> Option<NaiveDate> {
        self.actual_end
    }

    pub fn status(&self) -> ProductionStatus {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn requirements(&self) -> &[MaterialRequirement] {
        &self.requirements
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn label(&self) -> String {
        format!("production order {}", self.order_number)
    }

    /// Days the order finished past its planned end; 0 while unfinished.
    pub fn delay_days(&self) -> i64 {
        self.actual_end
            .map(|end| (end - self.planned_end).num_days())
            .unwrap_or(0)
    }

    pub fn ensure_can(&self, action: ProductionAction) -> DomainResult<ProductionStatus> {
        self.status
            .transition(action)
            .ok_or_else(|| DomainError::invalid_transition(self.label(), self.status, action.verb()))
    }

    fn apply(&mut self, action: ProductionAction, at: DateTime<Utc>) -> DomainResult<ProductionStatus> {
        let next = self.ensure_can(action)?;
        self.status = next;
        self.updated_at = at;
        Ok(next)
    }

    fn ensure_requirements(&self) -> DomainResult<()> {
        if self.requirements.is_empty() {
            return Err(DomainError::EmptyOrder(self.label()));
        }
        Ok(())
    }

    pub fn add_requirement(
        &mut self,
        material_id: StockItemId,
        required: Quantity,
        notes: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != ProductionStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.label(),
                self.status,
                "change materials of",
            ));
        }
        if self.requirements.iter().any(|r| r.material_id == material_id) {
            return Err(DomainError::conflict(format!(
                "material {material_id} is already required by {}",
                self.label()
            )));
        }
        self.requirements.push(MaterialRequirement {
            material_id,
            required,
            actual: Decimal::ZERO,
            notes: notes.into(),
        });
        self.updated_at = at;
        Ok(())
    }

    /// Compare every requirement against current stock, reporting all shortages.
    pub fn find_shortages<'a>(
        &self,
        mut material: impl FnMut(StockItemId) -> DomainResult<&'a StockItem>,
    ) -> DomainResult<Vec<MaterialShortage>> {
        let mut shortages = Vec::new();
        for requirement in &self.requirements {
            let item = material(requirement.material_id)?;
            if item.stock() < requirement.required.value() {
                shortages.push(MaterialShortage {
                    material: item.label(),
                    required: requirement.required.value(),
                    available: item.stock(),
                });
            }
        }
        Ok(shortages)
    }

    /// Gate `pending → material_ready`. No ledger effect.
    pub fn mark_material_ready(&mut self, shortages: Vec<MaterialShortage>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_can(ProductionAction::MaterialReady)?;
        self.ensure_requirements()?;
        if !shortages.is_empty() {
            return Err(DomainError::InsufficientMaterial(shortages));
        }
        self.apply(ProductionAction::MaterialReady, at).map(|_| ())
    }

    /// Precondition for consuming materials at start.
    pub fn ensure_startable(&self) -> DomainResult<()> {
        self.ensure_can(ProductionAction::Start)?;
        self.ensure_requirements()
    }

    /// Record that a requirement has been fully drawn from stock.
    pub fn mark_consumed(&mut self, material_id: StockItemId) -> DomainResult<()> {
        let requirement = self
            .requirements
            .iter_mut()
            .find(|r| r.material_id == material_id)
            .ok_or_else(|| DomainError::not_found(format!("requirement for material {material_id}")))?;
        requirement.actual = requirement.required.value();
        Ok(())
    }

    pub fn start(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_startable()?;
        if let Some(open) = self.requirements.iter().find(|r| r.actual < r.required.value()) {
            return Err(DomainError::invariant(format!(
                "material {} not consumed before starting {}",
                open.material_id,
                self.label()
            )));
        }
        self.apply(ProductionAction::Start, at)?;
        self.actual_start = Some(at.date_naive());
        Ok(())
    }

    /// Append a progress record on top of `latest` and mirror its totals.
    pub fn record_progress(
        &mut self,
        id: ProgressId,
        latest: Option<&ProductionProgress>,
        quantity: Quantity,
        notes: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<ProductionProgress> {
        if self.status != ProductionStatus::InProduction {
            return Err(DomainError::invalid_transition(
                self.label(),
                self.status,
                "record progress on",
            ));
        }
        let record = ProductionProgress::next(id, self.id, self.planned_quantity, latest, quantity, notes, at)?;
        self.completed_quantity = record.accumulated();
        self.progress = record.progress();
        self.updated_at = at;
        Ok(record)
    }

    /// Undo `target`, which must be the latest record; totals fall back to `previous`.
    pub fn cancel_progress(
        &mut self,
        target: &ProductionProgress,
        latest: Option<&ProductionProgress>,
        previous: Option<&ProductionProgress>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != ProductionStatus::InProduction {
            return Err(DomainError::invalid_transition(
                self.label(),
                self.status,
                "cancel progress of",
            ));
        }
        if target.order_id() != self.id {
            return Err(DomainError::validation(format!(
                "progress record does not belong to {}",
                self.label()
            )));
        }
        if latest.map(ProductionProgress::id_typed) != Some(target.id_typed()) {
            return Err(DomainError::validation("only the latest progress record can be cancelled"));
        }

        (self.completed_quantity, self.progress) = match previous {
            Some(p) => (p.accumulated(), p.progress()),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        self.updated_at = at;
        Ok(())
    }

    /// Finish the order with `quantity` produced. The product `in` movement is the caller's.
    pub fn complete(&mut self, quantity: Quantity, require_full: bool, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_can(ProductionAction::Complete)?;
        if require_full && quantity < self.planned_quantity {
            return Err(DomainError::validation(format!(
                "completed quantity {quantity} is below planned {}",
                self.planned_quantity
            )));
        }
        self.apply(ProductionAction::Complete, at)?;
        self.completed_quantity = quantity.value();
        self.progress = percentage(quantity.value(), self.planned_quantity);
        self.actual_end = Some(at.date_naive());
        Ok(())
    }

    /// Reopen a completed order. Totals fall back to `latest` progress (or
    /// zero). The compensating `out` movement is the caller's.
    pub fn cancel_completion(&mut self, latest: Option<&ProductionProgress>, at: DateTime<Utc>) -> DomainResult<()> {
        self.apply(ProductionAction::CancelCompletion, at)?;
        (self.completed_quantity, self.progress) = match latest {
            Some(p) => (p.accumulated(), p.progress()),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        self.actual_end = None;
        Ok(())
    }
}

impl Entity for ProductionOrder {
    type Id = ProductionOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
