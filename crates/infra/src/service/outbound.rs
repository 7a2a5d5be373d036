//! Product outbound: shipping finished goods out of stock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use millerp_core::{DomainError, DomainResult};
use millerp_events::{EventBus, EventEnvelope};
use millerp_inventory::{Direction, LedgerStore, MovementRequest, SourceKind, SourceRef, unreversed};
use millerp_sales::{
    OutboundId, OutboundLine, OutboundLineChanged, OutboundLineInput, OutboundStatus,
    OutboundStatusChanged, ProductOutbound, SalesEvent, SalesOrderId, next_outbound_number,
};

use super::ErpService;
use crate::error::ServiceResult;
use crate::store::Tables;

const AGGREGATE: &str = "sales.outbound";

/// Request to draft an outbound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOutbound {
    /// Generated as `{YYYYMMDD}{seq:03}` when absent.
    #[serde(default)]
    pub outbound_number: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub outbound_date: Option<NaiveDate>,
    #[serde(default)]
    pub sales_order_id: Option<SalesOrderId>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub lines: Vec<OutboundLineInput>,
}

fn line_source(id: OutboundId, line_no: u32) -> SourceRef {
    SourceRef::new(SourceKind::Outbound, id).line(line_no)
}

fn bind_line(
    tables: &Tables,
    outbound: &mut ProductOutbound,
    input: &OutboundLineInput,
    at: DateTime<Utc>,
) -> DomainResult<OutboundLine> {
    let product = tables.item(input.product_id)?;
    if !product.is_active() {
        return Err(DomainError::validation(format!("{} is inactive", product.label())));
    }
    outbound
        .add_line(product, input.quantity, input.notes.as_str(), at)
        .cloned()
}

/// Ship one line: an `out` movement tagged with the outbound line.
fn ship_line(tables: &mut Tables, outbound: &ProductOutbound, line: &OutboundLine, at: DateTime<Utc>) -> DomainResult<()> {
    tables.record(
        MovementRequest::outbound(line.product_id, line.quantity, outbound.outbound_number())
            .source(line_source(outbound.id_typed(), line.line_no))
            .notes(format!("shipped on outbound {}", outbound.outbound_number())),
        at,
    )?;
    Ok(())
}

/// Put back whatever `source` still has shipped.
fn return_shipped(tables: &mut Tables, outbound: &ProductOutbound, source: &SourceRef, at: DateTime<Utc>) -> DomainResult<()> {
    let shipped: Vec<_> = unreversed(tables.movements.iter(), source, Direction::Out)
        .into_iter()
        .cloned()
        .collect();
    for movement in shipped {
        tables.record(
            MovementRequest::reversal_of(&movement, outbound.reversal_reference())
                .notes(format!("outbound {} reversed", outbound.outbound_number())),
            at,
        )?;
    }
    Ok(())
}

fn status_changed(tables: &mut Tables, outbound: &ProductOutbound, at: DateTime<Utc>) -> DomainResult<()> {
    tables.emit(
        outbound.id_typed().aggregate_id(),
        AGGREGATE,
        SalesEvent::OutboundStatusChanged(OutboundStatusChanged {
            outbound_id: outbound.id_typed(),
            outbound_number: outbound.outbound_number().to_string(),
            status: outbound.status(),
            occurred_at: at,
        }),
    )
}

fn line_changed(
    tables: &mut Tables,
    outbound: &ProductOutbound,
    line: &OutboundLine,
    added: bool,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    let quantity = if added { line.quantity.value() } else { -line.quantity.value() };
    tables.emit(
        outbound.id_typed().aggregate_id(),
        AGGREGATE,
        SalesEvent::OutboundLineChanged(OutboundLineChanged {
            outbound_id: outbound.id_typed(),
            line_no: line.line_no,
            product_id: line.product_id,
            quantity,
            stock_moved: outbound.status() == OutboundStatus::Confirmed,
            occurred_at: at,
        }),
    )
}

impl<B> ErpService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Draft an outbound with its lines. Stock is untouched until confirm.
    pub fn create_outbound(&self, input: NewOutbound) -> ServiceResult<ProductOutbound> {
        let today = self.clock.today();
        self.execute("create_outbound", |tables, at| {
            let date = input.outbound_date.unwrap_or(today);
            let number = match input.outbound_number.as_deref().map(str::trim) {
                Some(number) => {
                    if tables.outbounds.iter().any(|o| o.outbound_number() == number) {
                        return Err(DomainError::conflict(format!("outbound number {number} is already used")));
                    }
                    number.to_string()
                }
                None => next_outbound_number(date, tables.outbounds.iter().map(|o| o.outbound_number()))?,
            };
            if let Some(sales_id) = input.sales_order_id {
                tables.sales_order(sales_id)?;
            }

            let mut outbound =
                ProductOutbound::create(OutboundId::generate(), number, date, input.sales_order_id, input.notes.as_str(), at)?;
            for line in &input.lines {
                bind_line(tables, &mut outbound, line, at)?;
            }

            tables.outbounds.insert(outbound.clone());
            status_changed(tables, &outbound, at)?;
            tracing::info!(outbound = outbound.outbound_number(), lines = outbound.lines().len(), "outbound drafted");
            Ok(outbound)
        })
    }

    /// Confirm a draft: every line ships or none does.
    pub fn confirm_outbound(&self, id: OutboundId) -> ServiceResult<ProductOutbound> {
        self.execute("confirm_outbound", |tables, at| {
            let mut outbound = tables.outbound(id)?.clone();
            outbound.confirm(at)?;
            for line in outbound.lines() {
                ship_line(tables, &outbound, line, at)?;
            }

            tables.outbounds.insert(outbound.clone());
            status_changed(tables, &outbound, at)?;
            tracing::info!(outbound = outbound.outbound_number(), "outbound confirmed");
            Ok(outbound)
        })
    }

    /// Cancel a confirmed outbound, returning every shipped line to stock.
    pub fn cancel_outbound(&self, id: OutboundId) -> ServiceResult<ProductOutbound> {
        self.execute("cancel_outbound", |tables, at| {
            let mut outbound = tables.outbound(id)?.clone();
            outbound.cancel(at)?;
            return_shipped(tables, &outbound, &SourceRef::new(SourceKind::Outbound, id), at)?;

            tables.outbounds.insert(outbound.clone());
            status_changed(tables, &outbound, at)?;
            tracing::info!(outbound = outbound.outbound_number(), "outbound cancelled");
            Ok(outbound)
        })
    }

    /// Add a line; on a confirmed outbound it ships immediately.
    pub fn add_outbound_line(&self, id: OutboundId, input: OutboundLineInput) -> ServiceResult<ProductOutbound> {
        self.execute("add_outbound_line", |tables, at| {
            let mut outbound = tables.outbound(id)?.clone();
            let line = bind_line(tables, &mut outbound, &input, at)?;
            if outbound.status() == OutboundStatus::Confirmed {
                ship_line(tables, &outbound, &line, at)?;
            }

            tables.outbounds.insert(outbound.clone());
            line_changed(tables, &outbound, &line, true, at)?;
            Ok(outbound)
        })
    }

    /// Remove a line; on a confirmed outbound its quantity returns to stock.
    pub fn remove_outbound_line(&self, id: OutboundId, line_no: u32) -> ServiceResult<ProductOutbound> {
        self.execute("remove_outbound_line", |tables, at| {
            let mut outbound = tables.outbound(id)?.clone();
            let line = outbound.remove_line(line_no, at)?;
            if outbound.status() == OutboundStatus::Confirmed {
                return_shipped(tables, &outbound, &line_source(id, line_no), at)?;
            }

            tables.outbounds.insert(outbound.clone());
            line_changed(tables, &outbound, &line, false, at)?;
            Ok(outbound)
        })
    }

    pub fn outbound(&self, id: OutboundId) -> ServiceResult<ProductOutbound> {
        self.query(|tables| tables.outbound(id).cloned())
    }

    pub fn outbounds(&self) -> ServiceResult<Vec<ProductOutbound>> {
        self.query(|tables| Ok(tables.outbounds.iter().cloned().collect()))
    }
}
