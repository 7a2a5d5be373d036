//! Sales orders and production: material gate, FIFO consumption, progress,
//! completion and its reversal, process steps and per-order process plans.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use millerp_core::{DomainError, DomainResult, Quantity};
use millerp_events::{EventBus, EventEnvelope};
use millerp_inventory::{
    Direction, ItemKind, LedgerStore, MovementRequest, SourceKind, SourceRef, StockItemId, allocate,
    unreversed,
};
use millerp_production::{
    ConsumedBatch, ConsumptionId, MaterialsConsumed, NewProcessStep, NewProductionOrder,
    ProcessSchedule, ProcessStep, ProcessStepId, ProcessesScheduled, ProductionEvent,
    ProductionMaterial, ProductionOrder, ProductionOrderId, ProductionProgress, ProductionStatus,
    ProductionStatusChanged, ProgressCancelled, ProgressId, ProgressRecorded,
    projected_sales_status, schedule_processes,
};
use millerp_sales::{NewSalesOrder, SalesEvent, SalesOrder, SalesOrderId, SalesOrderProjected};

use super::ErpService;
use crate::error::ServiceResult;
use crate::store::Tables;

const AGGREGATE: &str = "production.order";

fn production_source(id: ProductionOrderId) -> SourceRef {
    SourceRef::new(SourceKind::Production, id)
}

fn status_changed(
    tables: &mut Tables,
    order: &ProductionOrder,
    from: ProductionStatus,
    at: DateTime<Utc>,
) -> DomainResult<()> {
    tables.emit(
        order.id_typed().aggregate_id(),
        AGGREGATE,
        ProductionEvent::ProductionStatusChanged(ProductionStatusChanged {
            order_id: order.id_typed(),
            order_number: order.order_number().to_string(),
            from,
            to: order.status(),
            occurred_at: at,
        }),
    )?;
    tracing::info!(order = order.order_number(), %from, to = %order.status(), "production status changed");
    Ok(())
}

/// Advance the linked sales order to the status implied by `order`.
fn project_sales_order(tables: &mut Tables, order: &ProductionOrder, at: DateTime<Utc>) -> DomainResult<()> {
    let (Some(sales_id), Some(target)) = (order.sales_order_id(), projected_sales_status(order.status())) else {
        return Ok(());
    };
    let Some(sales) = tables.sales_orders.get_mut(sales_id) else {
        tracing::warn!(sales_order = %sales_id, order = order.order_number(), "linked sales order is gone");
        return Ok(());
    };
    let Some(from) = sales.project(target, at) else {
        return Ok(());
    };
    let event = SalesOrderProjected {
        order_id: sales_id,
        order_number: sales.order_number().to_string(),
        from,
        to: sales.status(),
        occurred_at: at,
    };
    tables.emit(sales_id.aggregate_id(), "sales.order", SalesEvent::SalesOrderProjected(event))
}

impl<B> ErpService<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn create_sales_order(&self, input: NewSalesOrder) -> ServiceResult<SalesOrder> {
        self.execute("create_sales_order", |tables, at| {
            let number = input.order_number.trim();
            if tables.sales_orders.iter().any(|o| o.order_number() == number) {
                return Err(DomainError::conflict(format!("sales order {number} already exists")));
            }
            let order = SalesOrder::create(SalesOrderId::generate(), input.clone(), at)?;
            tables.sales_orders.insert(order.clone());
            tracing::info!(sales_order = order.order_number(), customer = order.customer(), "sales order created");
            Ok(order)
        })
    }

    pub fn sales_order(&self, id: SalesOrderId) -> ServiceResult<SalesOrder> {
        self.query(|tables| tables.sales_order(id).cloned())
    }

    /// Create a pending production order for a finished product, optionally
    /// linked to one sales order.
    pub fn create_production_order(&self, input: NewProductionOrder) -> ServiceResult<ProductionOrder> {
        self.execute("create_production_order", |tables, at| {
            let product = tables.item(input.product_id)?;
            if product.kind() != ItemKind::Product || !product.is_active() {
                return Err(DomainError::validation(format!(
                    "{} is not an active finished product",
                    product.label()
                )));
            }
            let number = input.order_number.trim();
            if tables.production_orders.iter().any(|o| o.order_number() == number) {
                return Err(DomainError::conflict(format!("production order {number} already exists")));
            }
            if let Some(sales_id) = input.sales_order_id {
                let sales = tables.sales_order(sales_id)?;
                if tables
                    .production_orders
                    .iter()
                    .any(|o| o.sales_order_id() == Some(sales_id))
                {
                    return Err(DomainError::conflict(format!(
                        "sales order {} already has a production order",
                        sales.order_number()
                    )));
                }
            }

            let order = ProductionOrder::create(ProductionOrderId::generate(), input.clone(), at)?;
            tables.production_orders.insert(order.clone());
            tracing::info!(order = order.order_number(), planned = %order.planned_quantity(), "production order created");
            Ok(order)
        })
    }

    pub fn add_material_requirement(
        &self,
        id: ProductionOrderId,
        material_id: StockItemId,
        required: Quantity,
        notes: &str,
    ) -> ServiceResult<ProductionOrder> {
        self.execute("add_material_requirement", |tables, at| {
            let material = tables.item(material_id)?;
            if material.kind() != ItemKind::Material {
                return Err(DomainError::validation(format!("{} is not a material", material.label())));
            }
            let mut order = tables.production_order(id)?.clone();
            order.add_requirement(material_id, required, notes, at)?;
            tables.production_orders.insert(order.clone());
            Ok(order)
        })
    }

    /// Gate `pending → material_ready` on current stock. Every short
    /// material is reported; nothing moves in the ledger.
    pub fn mark_material_ready(&self, id: ProductionOrderId) -> ServiceResult<ProductionOrder> {
        self.execute("mark_material_ready", |tables, at| {
            let mut order = tables.production_order(id)?.clone();
            let from = order.status();
            let view: &Tables = tables;
            let shortages = order.find_shortages(|m| view.item(m))?;
            order.mark_material_ready(shortages, at)?;
            tables.production_orders.insert(order.clone());
            status_changed(tables, &order, from, at)?;
            Ok(order)
        })
    }

    /// Start production: draw every requirement from its batches oldest
    /// first, one `out` movement and one consumption row per batch.
    pub fn start_production(&self, id: ProductionOrderId) -> ServiceResult<ProductionOrder> {
        self.execute("start_production", |tables, at| {
            let mut order = tables.production_order(id)?.clone();
            let from = order.status();
            order.ensure_startable()?;

            let mut consumed = Vec::new();
            for requirement in order.requirements().to_vec() {
                let material = tables.item(requirement.material_id)?.clone();
                let plan = allocate(&material, tables.batches.iter(), requirement.required)?;
                for allocation in plan {
                    let movement = tables.record(
                        MovementRequest::outbound(material.id_typed(), allocation.quantity, order.order_number())
                            .batch(allocation.batch_id)
                            .source(production_source(id))
                            .notes(format!(
                                "consumed from batch {} by {}",
                                allocation.batch_number,
                                order.label()
                            )),
                        at,
                    )?;
                    tables.consumption.insert(ProductionMaterial {
                        id: ConsumptionId::generate(),
                        order_id: id,
                        material_id: material.id_typed(),
                        batch_id: allocation.batch_id,
                        batch_number: allocation.batch_number.clone(),
                        quantity_used: allocation.quantity,
                        movement_id: movement.id_typed(),
                        created_at: at,
                    });
                    consumed.push(ConsumedBatch {
                        material_id: material.id_typed(),
                        batch_id: allocation.batch_id,
                        batch_number: allocation.batch_number,
                        quantity: allocation.quantity.value(),
                    });
                }
                order.mark_consumed(requirement.material_id)?;
            }
            order.start(at)?;

            tables.production_orders.insert(order.clone());
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                ProductionEvent::MaterialsConsumed(MaterialsConsumed {
                    order_id: id,
                    batches: consumed,
                    occurred_at: at,
                }),
            )?;
            status_changed(tables, &order, from, at)?;
            project_sales_order(tables, &order, at)?;
            Ok(order)
        })
    }

    /// Append a progress report to an order in production.
    pub fn record_progress(
        &self,
        id: ProductionOrderId,
        quantity: Quantity,
        notes: &str,
    ) -> ServiceResult<ProductionProgress> {
        self.execute("record_progress", |tables, at| {
            let mut order = tables.production_order(id)?.clone();
            let latest = tables.progress_of(id).last().map(|p| (*p).clone());
            let record = order.record_progress(ProgressId::generate(), latest.as_ref(), quantity, notes, at)?;

            tables.progress.insert(record.clone());
            tables.production_orders.insert(order.clone());
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                ProductionEvent::ProgressRecorded(ProgressRecorded {
                    order_id: id,
                    progress_id: record.id_typed(),
                    quantity: record.quantity().value(),
                    accumulated: record.accumulated(),
                    progress: record.progress(),
                    occurred_at: at,
                }),
            )?;
            tracing::debug!(order = order.order_number(), accumulated = %record.accumulated(), "progress recorded");
            Ok(record)
        })
    }

    /// Undo the latest progress record of its order.
    pub fn cancel_progress(&self, progress_id: ProgressId) -> ServiceResult<ProductionOrder> {
        self.execute("cancel_progress", |tables, at| {
            let target = tables
                .progress
                .get(progress_id)
                .cloned()
                .ok_or_else(|| DomainError::not_found(format!("progress record {progress_id}")))?;
            let id = target.order_id();
            let mut order = tables.production_order(id)?.clone();

            let history: Vec<ProductionProgress> = tables.progress_of(id).into_iter().cloned().collect();
            let latest = history.last();
            let previous = history.len().checked_sub(2).and_then(|i| history.get(i));
            order.cancel_progress(&target, latest, previous, at)?;

            tables.progress.remove(progress_id);
            tables.production_orders.insert(order.clone());
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                ProductionEvent::ProgressCancelled(ProgressCancelled {
                    order_id: id,
                    progress_id,
                    accumulated: order.completed_quantity(),
                    occurred_at: at,
                }),
            )?;
            Ok(order)
        })
    }

    /// Finish production: the finished quantity enters stock as an `in`
    /// movement and the linked sales order becomes completed.
    pub fn complete_production(&self, id: ProductionOrderId, quantity: Quantity) -> ServiceResult<ProductionOrder> {
        let require_full = self.config.require_full_completion;
        self.execute("complete_production", |tables, at| {
            let mut order = tables.production_order(id)?.clone();
            let from = order.status();
            if !unreversed(tables.movements.iter(), &production_source(id), Direction::In).is_empty() {
                return Err(DomainError::conflict(format!(
                    "{} already booked its finished goods",
                    order.label()
                )));
            }
            order.complete(quantity, require_full, at)?;

            tables.record(
                MovementRequest::inbound(order.product_id(), quantity, order.order_number())
                    .source(production_source(id))
                    .notes(format!("finished goods of {}", order.label())),
                at,
            )?;

            tables.production_orders.insert(order.clone());
            status_changed(tables, &order, from, at)?;
            project_sales_order(tables, &order, at)?;
            Ok(order)
        })
    }

    /// Reopen a completed order and take its finished goods back out of
    /// stock. The sales order keeps its status.
    pub fn cancel_completion(&self, id: ProductionOrderId) -> ServiceResult<ProductionOrder> {
        self.execute("cancel_completion", |tables, at| {
            let mut order = tables.production_order(id)?.clone();
            let from = order.status();
            let latest = tables.progress_of(id).last().map(|p| (*p).clone());
            order.cancel_completion(latest.as_ref(), at)?;

            let booked: Vec<_> = unreversed(tables.movements.iter(), &production_source(id), Direction::In)
                .into_iter()
                .cloned()
                .collect();
            for movement in booked {
                tables.record(
                    MovementRequest::reversal_of(&movement, order.order_number())
                        .notes(format!("completion of {} cancelled", order.label())),
                    at,
                )?;
            }

            tables.production_orders.insert(order.clone());
            status_changed(tables, &order, from, at)?;
            Ok(order)
        })
    }

    pub fn production_order(&self, id: ProductionOrderId) -> ServiceResult<ProductionOrder> {
        self.query(|tables| tables.production_order(id).cloned())
    }

    pub fn progress_history(&self, id: ProductionOrderId) -> ServiceResult<Vec<ProductionProgress>> {
        self.query(|tables| {
            tables.production_order(id)?;
            Ok(tables.progress_of(id).into_iter().cloned().collect())
        })
    }

    /// Batches drawn by one order, in drawing order.
    pub fn consumption_of(&self, id: ProductionOrderId) -> ServiceResult<Vec<ProductionMaterial>> {
        self.query(|tables| {
            tables.production_order(id)?;
            Ok(tables
                .consumption
                .iter()
                .filter(|c| c.order_id == id)
                .cloned()
                .collect())
        })
    }

    /// Days the order finished after its planned end (negative when early,
    /// zero while unfinished).
    pub fn delay_days(&self, id: ProductionOrderId) -> ServiceResult<i64> {
        self.query(|tables| Ok(tables.production_order(id)?.delay_days()))
    }

    /// Add a step to the shop routing. Codes and sequence numbers are unique.
    pub fn define_process_step(&self, input: NewProcessStep) -> ServiceResult<ProcessStep> {
        self.execute("define_process_step", |tables, at| {
            let step = ProcessStep::create(ProcessStepId::generate(), input, at)?;
            if let Some(existing) = tables
                .process_steps
                .iter()
                .find(|s| s.code() == step.code() || s.sequence() == step.sequence())
            {
                return Err(DomainError::conflict(format!(
                    "process step {} already uses code {} or sequence {}",
                    existing.name(),
                    step.code(),
                    step.sequence()
                )));
            }
            tables.process_steps.insert(step.clone());
            tracing::info!(step = step.code(), sequence = step.sequence(), capacity = %step.daily_capacity(), "process step defined");
            Ok(step)
        })
    }

    pub fn process_steps(&self) -> ServiceResult<Vec<ProcessStep>> {
        self.query(|tables| Ok(tables.routing().into_iter().cloned().collect()))
    }

    /// Plan every routing step for one order, starting now. A new plan
    /// replaces the order's previous one.
    pub fn schedule_processes(&self, id: ProductionOrderId) -> ServiceResult<Vec<ProcessSchedule>> {
        self.execute("schedule_processes", |tables, at| {
            let order = tables.production_order(id)?;
            let plan = schedule_processes(order, tables.routing(), at)?;
            let label = order.label();

            let stale: Vec<_> = tables.schedule_of(id).into_iter().map(|s| s.id).collect();
            for schedule_id in stale {
                tables.schedules.remove(schedule_id);
            }
            for row in &plan {
                tables.schedules.insert(row.clone());
            }

            let planned_end = plan.last().map_or(at, |s| s.planned_end);
            tables.emit(
                id.aggregate_id(),
                AGGREGATE,
                ProductionEvent::ProcessesScheduled(ProcessesScheduled {
                    order_id: id,
                    steps: plan.len(),
                    planned_start: at,
                    planned_end,
                    occurred_at: at,
                }),
            )?;
            tracing::info!(order = %label, steps = plan.len(), %planned_end, "processes scheduled");
            Ok(plan)
        })
    }

    /// The order's current process plan, earliest step first.
    pub fn process_schedule(&self, id: ProductionOrderId) -> ServiceResult<Vec<ProcessSchedule>> {
        self.query(|tables| {
            tables.production_order(id)?;
            Ok(tables.schedule_of(id).into_iter().cloned().collect())
        })
    }
}
