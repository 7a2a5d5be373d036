use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity, Quantity};
use millerp_inventory::StockItemId;

millerp_core::typed_id!(
    /// Material purchase order identifier.
    PurchaseOrderId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Draft,
    Pending,
    Received,
    Completed,
    Cancelled,
}

impl core::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            PurchaseStatus::Draft => "draft",
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Received => "received",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseAction {
    Submit,
    Receive,
    CancelReceive,
    Complete,
    Cancel,
}

impl PurchaseAction {
    fn verb(self) -> &'static str {
        match self {
            PurchaseAction::Submit => "submit",
            PurchaseAction::Receive => "receive",
            PurchaseAction::CancelReceive => "cancel receipt of",
            PurchaseAction::Complete => "complete",
            PurchaseAction::Cancel => "cancel",
        }
    }
}

impl PurchaseStatus {
    /// The legal transition table. `None` means the action is not allowed.
    pub fn transition(self, action: PurchaseAction) -> Option<PurchaseStatus> {
        use PurchaseAction as A;
        use PurchaseStatus as S;

        match (self, action) {
            (S::Draft, A::Submit) => Some(S::Pending),
            (S::Pending, A::Receive) => Some(S::Received),
            (S::Received, A::CancelReceive) => Some(S::Pending),
            (S::Received, A::Complete) => Some(S::Completed),
            (S::Pending, A::Cancel) => Some(S::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub material_id: StockItemId,
    pub quantity: Quantity,
    /// Only touched by receive / cancel-receive; never exceeds `quantity`.
    pub received_quantity: Decimal,
    pub unit: String,
    pub specification: String,
}

/// Header fields supplied when a purchase is drafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub purchase_number: String,
    pub supplier: String,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    purchase_number: String,
    supplier: String,
    purchase_date: NaiveDate,
    delivery_date: Option<NaiveDate>,
    status: PurchaseStatus,
    lines: Vec<PurchaseLine>,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PurchaseOrder {
    pub fn create(id: PurchaseOrderId, input: NewPurchaseOrder, at: DateTime<Utc>) -> DomainResult<Self> {
        if input.purchase_number.trim().is_empty() {
            return Err(DomainError::validation("purchase number cannot be empty"));
        }
        if input.supplier.trim().is_empty() {
            return Err(DomainError::validation("supplier cannot be empty"));
        }
        if input.delivery_date.is_some_and(|d| d < input.purchase_date) {
            return Err(DomainError::validation("delivery date precedes purchase date"));
        }

        Ok(Self {
            id,
            purchase_number: input.purchase_number.trim().to_string(),
            supplier: input.supplier,
            purchase_date: input.purchase_date,
            delivery_date: input.delivery_date,
            status: PurchaseStatus::Draft,
            lines: Vec::new(),
            notes: input.notes,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn purchase_number(&self) -> &str {
        &self.purchase_number
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn purchase_date(&self) -> NaiveDate {
        self.purchase_date
    }

    pub fn delivery_date(&self) -> Option<NaiveDate> {
        self.delivery_date
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
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

    fn label(&self) -> String {
        format!("purchase {}", self.purchase_number)
    }

    /// Fail unless `action` is legal from the current status.
    pub fn ensure_can(&self, action: PurchaseAction) -> DomainResult<PurchaseStatus> {
        self.status
            .transition(action)
            .ok_or_else(|| DomainError::invalid_transition(self.label(), self.status, action.verb()))
    }

    fn apply(&mut self, action: PurchaseAction, at: DateTime<Utc>) -> DomainResult<PurchaseStatus> {
        let next = self.ensure_can(action)?;
        self.status = next;
        self.updated_at = at;
        Ok(next)
    }

    /// Idempotency guard for receive. `has_live_receipts` is whether the ledger
    /// still holds unreversed `in` movements for this purchase.
    pub fn ensure_receivable(&self, has_live_receipts: bool) -> DomainResult<()> {
        if has_live_receipts || self.status == PurchaseStatus::Received {
            return Err(DomainError::AlreadyReceived(self.purchase_number.clone()));
        }
        self.ensure_can(PurchaseAction::Receive).map(|_| ())
    }

    pub fn add_line(
        &mut self,
        material_id: StockItemId,
        quantity: Quantity,
        unit: impl Into<String>,
        specification: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<u32> {
        self.ensure_draft("add line to")?;
        if self.lines.iter().any(|l| l.material_id == material_id) {
            return Err(DomainError::conflict(format!(
                "material {material_id} already has a line on {}",
                self.label()
            )));
        }
        let unit = unit.into();
        if unit.trim().is_empty() {
            return Err(DomainError::validation("unit of measure cannot be empty"));
        }

        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        self.lines.push(PurchaseLine {
            line_no,
            material_id,
            quantity,
            received_quantity: Decimal::ZERO,
            unit,
            specification: specification.into(),
        });
        self.updated_at = at;
        Ok(line_no)
    }

    pub fn remove_line(&mut self, line_no: u32, at: DateTime<Utc>) -> DomainResult<PurchaseLine> {
        self.ensure_draft("remove line from")?;
        let index = self
            .lines
            .iter()
            .position(|l| l.line_no == line_no)
            .ok_or_else(|| DomainError::not_found(format!("line {line_no} of {}", self.label())))?;
        self.updated_at = at;
        Ok(self.lines.remove(index))
    }

    fn ensure_draft(&self, operation: &str) -> DomainResult<()> {
        if self.status != PurchaseStatus::Draft {
            return Err(DomainError::invalid_transition(self.label(), self.status, operation));
        }
        Ok(())
    }

    pub fn submit(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_can(PurchaseAction::Submit)?;
        if self.lines.is_empty() {
            return Err(DomainError::EmptyOrder(self.label()));
        }
        self.apply(PurchaseAction::Submit, at).map(|_| ())
    }

    /// Mark every line fully received. Ledger effects are the caller's.
    pub fn receive(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::EmptyOrder(self.label()));
        }
        self.apply(PurchaseAction::Receive, at)?;
        for line in &mut self.lines {
            line.received_quantity = line.quantity.value();
        }
        Ok(())
    }

    pub fn cancel_receive(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.apply(PurchaseAction::CancelReceive, at)?;
        for line in &mut self.lines {
            line.received_quantity = Decimal::ZERO;
        }
        Ok(())
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.apply(PurchaseAction::Complete, at).map(|_| ())
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.apply(PurchaseAction::Cancel, at).map(|_| ())
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
