use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity, Quantity};
use millerp_inventory::{ItemKind, StockItem, StockItemId};

use crate::order::SalesOrderId;

millerp_core::typed_id!(
    /// Product outbound (shipment) identifier.
    OutboundId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl core::fmt::Display for OutboundStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            OutboundStatus::Draft => "draft",
            OutboundStatus::Confirmed => "confirmed",
            OutboundStatus::Cancelled => "cancelled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundLine {
    pub line_no: u32,
    pub product_id: StockItemId,
    pub quantity: Quantity,
    pub unit: String,
    pub notes: String,
}

/// A requested line, before it is bound to an outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundLineInput {
    pub product_id: StockItemId,
    pub quantity: Quantity,
    #[serde(default)]
    pub notes: String,
}

/// Aggregate root: ProductOutbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOutbound {
    id: OutboundId,
    outbound_number: String,
    outbound_date: NaiveDate,
    sales_order_id: Option<SalesOrderId>,
    status: OutboundStatus,
    lines: Vec<OutboundLine>,
    notes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductOutbound {
    pub fn create(
        id: OutboundId,
        outbound_number: impl Into<String>,
        outbound_date: NaiveDate,
        sales_order_id: Option<SalesOrderId>,
        notes: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let outbound_number = outbound_number.into();
        if outbound_number.trim().is_empty() {
            return Err(DomainError::validation("outbound number cannot be empty"));
        }

        Ok(Self {
            id,
            outbound_number,
            outbound_date,
            sales_order_id,
            status: OutboundStatus::Draft,
            lines: Vec::new(),
            notes: notes.into(),
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> OutboundId {
        self.id
    }

    pub fn outbound_number(&self) -> &str {
        &self.outbound_number
    }

    pub fn outbound_date(&self) -> NaiveDate {
        self.outbound_date
    }

    pub fn sales_order_id(&self) -> Option<SalesOrderId> {
        self.sales_order_id
    }

    pub fn status(&self) -> OutboundStatus {
        self.status
    }

    pub fn lines(&self) -> &[OutboundLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&OutboundLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Reference written on compensating movements.
    pub fn reversal_reference(&self) -> String {
        format!("cancelled-{}", self.outbound_number)
    }

    fn label(&self) -> String {
        format!("outbound {}", self.outbound_number)
    }

    fn invalid(&self, operation: &str) -> DomainError {
        DomainError::invalid_transition(self.label(), self.status, operation)
    }

    /// Add a line for a finished product. Allowed while draft or confirmed;
    /// on a confirmed outbound the caller posts the matching `out` movement.
    pub fn add_line(
        &mut self,
        product: &StockItem,
        quantity: Quantity,
        notes: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<&OutboundLine> {
        if self.status == OutboundStatus::Cancelled {
            return Err(self.invalid("add line to"));
        }
        if product.kind() != ItemKind::Product {
            return Err(DomainError::validation(format!(
                "{} is not a finished product",
                product.label()
            )));
        }
        if self.lines.iter().any(|l| l.product_id == product.id_typed()) {
            return Err(DomainError::conflict(format!(
                "{} already has a line on {}",
                product.label(),
                self.label()
            )));
        }

        let line_no = self.lines.iter().map(|l| l.line_no).max().unwrap_or(0) + 1;
        self.lines.push(OutboundLine {
            line_no,
            product_id: product.id_typed(),
            quantity,
            unit: product.unit().to_string(),
            notes: notes.into(),
        });
        self.updated_at = at;
        Ok(&self.lines[self.lines.len() - 1])
    }

    /// Remove a line. On a confirmed outbound the caller reverses its movement.
    pub fn remove_line(&mut self, line_no: u32, at: DateTime<Utc>) -> DomainResult<OutboundLine> {
        if self.status == OutboundStatus::Cancelled {
            return Err(self.invalid("remove line from"));
        }
        let index = self
            .lines
            .iter()
            .position(|l| l.line_no == line_no)
            .ok_or_else(|| DomainError::not_found(format!("line {line_no} of {}", self.label())))?;
        self.updated_at = at;
        Ok(self.lines.remove(index))
    }

    pub fn ensure_confirmable(&self) -> DomainResult<()> {
        if self.status != OutboundStatus::Draft {
            return Err(self.invalid("confirm"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::EmptyOrder(self.label()));
        }
        Ok(())
    }

    pub fn confirm(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_confirmable()?;
        self.status = OutboundStatus::Confirmed;
        self.updated_at = at;
        Ok(())
    }

    pub fn ensure_cancellable(&self) -> DomainResult<()> {
        if self.status != OutboundStatus::Confirmed {
            return Err(self.invalid("cancel"));
        }
        Ok(())
    }

    pub fn cancel(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_cancellable()?;
        self.status = OutboundStatus::Cancelled;
        self.updated_at = at;
        Ok(())
    }
}

impl Entity for ProductOutbound {
    type Id = OutboundId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
