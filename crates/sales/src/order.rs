use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity};

millerp_core::typed_id!(
    /// Sales (customer) order identifier.
    SalesOrderId
);

/// Sales order status lifecycle.
///
/// `Pending → Processing → Completed` is driven by linked production orders,
/// never edited directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Pending,
    Processing,
    Completed,
}

impl core::fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            SalesOrderStatus::Pending => "pending",
            SalesOrderStatus::Processing => "processing",
            SalesOrderStatus::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalesOrder {
    pub order_number: String,
    pub customer: String,
    pub customer_order_number: String,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    id: SalesOrderId,
    order_number: String,
    customer: String,
    customer_order_number: String,
    order_date: NaiveDate,
    delivery_date: NaiveDate,
    status: SalesOrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SalesOrder {
    pub fn create(id: SalesOrderId, input: NewSalesOrder, at: DateTime<Utc>) -> DomainResult<Self> {
        if input.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        if input.customer.trim().is_empty() {
            return Err(DomainError::validation("customer cannot be empty"));
        }
        if input.delivery_date < input.order_date {
            return Err(DomainError::validation("delivery date precedes order date"));
        }

        Ok(Self {
            id,
            order_number: input.order_number.trim().to_string(),
            customer: input.customer,
            customer_order_number: input.customer_order_number,
            order_date: input.order_date,
            delivery_date: input.delivery_date,
            status: SalesOrderStatus::Pending,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn customer_order_number(&self) -> &str {
        &self.customer_order_number
    }

    pub fn order_date(&self) -> NaiveDate {
        self.order_date
    }

    pub fn delivery_date(&self) -> NaiveDate {
        self.delivery_date
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply a projected status. Only forward steps `pending → processing` and
    /// `processing → completed` take effect; anything else is ignored.
    /// Returns the previous status when the order changed.
    pub fn project(&mut self, target: SalesOrderStatus, at: DateTime<Utc>) -> Option<SalesOrderStatus> {
        use SalesOrderStatus as S;

        let allowed = matches!(
            (self.status, target),
            (S::Pending, S::Processing) | (S::Processing, S::Completed)
        );
        if !allowed {
            return None;
        }
        let previous = self.status;
        self.status = target;
        self.updated_at = at;
        Some(previous)
    }
}

impl Entity for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
