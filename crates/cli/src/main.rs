//! Walks one order through the plant: purchase, receipt, process plan,
//! production, completion and shipment, logging every committed event.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rust_decimal_macros::dec;

use millerp_core::Quantity;
use millerp_events::{EventBus, EventEnvelope, InMemoryEventBus};
use millerp_infra::{ErpConfig, ErpService, NewOutbound};
use millerp_inventory::{NewStockItem, StockThresholds};
use millerp_production::{NewProcessStep, NewProductionOrder, Priority, WeightLine};
use millerp_purchasing::NewPurchaseOrder;
use millerp_sales::{NewSalesOrder, OutboundLineInput};

type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;

fn main() -> anyhow::Result<()> {
    let config = ErpConfig::from_env();
    millerp_observability::init(config.log_format);

    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let subscription = bus.subscribe();
    let listener = std::thread::spawn(move || {
        while let Ok(envelope) = subscription.recv() {
            tracing::info!(
                sequence = envelope.sequence_number(),
                event_type = envelope.event_type(),
                aggregate = %envelope.aggregate_id(),
                "event"
            );
        }
    });

    run(ErpService::new(config, bus))?;

    // Dropping the service drops the bus and ends the listener.
    listener
        .join()
        .map_err(|_| anyhow::anyhow!("event listener panicked"))?;
    Ok(())
}

fn run(erp: ErpService<Bus>) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let qty = |v| Quantity::new(v).context("quantity must be positive");

    let steel = erp.register_item(
        NewStockItem::material("STL-10", "Steel rod 10mm", "kg").with_thresholds(StockThresholds {
            min: dec!(10),
            warning: dec!(30),
            max: dec!(1000),
        }),
    )?;
    let bracket = erp.register_item(
        NewStockItem::product("BR-1", "Mounting bracket", "pcs").with_unit_weight(dec!(0.4)),
    )?;

    let purchase = erp.create_purchase(NewPurchaseOrder {
        purchase_number: format!("PO-{}", today.format("%Y%m%d")),
        supplier: "Acme Steel".to_string(),
        purchase_date: today,
        delivery_date: None,
        notes: String::new(),
    })?;
    erp.add_purchase_line(purchase.id_typed(), steel.id_typed(), qty(dec!(100))?, "10mm")?;
    erp.submit_purchase(purchase.id_typed())?;
    erp.receive_purchase(purchase.id_typed())?;

    let sales = erp.create_sales_order(NewSalesOrder {
        order_number: "SO-1".to_string(),
        customer: "Globex".to_string(),
        customer_order_number: "GX-7781".to_string(),
        order_date: today,
        delivery_date: today,
    })?;

    let estimate = erp.estimate_material_weight(&[WeightLine {
        product_id: bracket.id_typed(),
        quantity: dec!(100),
    }])?;
    tracing::info!(total_weight = %estimate.total_weight, "material weight estimated");

    let order = erp.create_production_order(NewProductionOrder {
        order_number: "MO-1".to_string(),
        sales_order_id: Some(sales.id_typed()),
        product_id: bracket.id_typed(),
        planned_quantity: qty(dec!(100))?,
        planned_start: today,
        planned_end: None,
        priority: Priority::High,
        notes: String::new(),
    })?;
    erp.add_material_requirement(order.id_typed(), steel.id_typed(), qty(dec!(40))?, "")?;
    for (sequence, code, capacity) in [(1, "CUT", dec!(50)), (2, "WELD", dec!(40)), (3, "PAINT", dec!(80))] {
        erp.define_process_step(NewProcessStep {
            code: code.to_string(),
            name: code.to_lowercase(),
            sequence,
            daily_capacity: capacity,
            is_bottleneck: code == "WELD",
            notes: String::new(),
        })?;
    }
    let plan = erp.schedule_processes(order.id_typed())?;
    if let Some(last) = plan.last() {
        tracing::info!(steps = plan.len(), finish = %last.planned_end, "process plan ready");
    }
    erp.mark_material_ready(order.id_typed())?;
    erp.start_production(order.id_typed())?;
    erp.record_progress(order.id_typed(), qty(dec!(60))?, "morning shift")?;
    erp.record_progress(order.id_typed(), qty(dec!(40))?, "evening shift")?;
    erp.complete_production(order.id_typed(), qty(dec!(100))?)?;

    let outbound = erp.create_outbound(NewOutbound {
        sales_order_id: Some(sales.id_typed()),
        lines: vec![OutboundLineInput {
            product_id: bracket.id_typed(),
            quantity: qty(dec!(100))?,
            notes: String::new(),
        }],
        ..NewOutbound::default()
    })?;
    erp.confirm_outbound(outbound.id_typed())?;

    let steel = erp.item(steel.id_typed())?;
    let bracket = erp.item(bracket.id_typed())?;
    tracing::info!(
        steel = %steel.stock(),
        steel_status = ?steel.stock_status(),
        brackets = %bracket.stock(),
        sales_order = %erp.sales_order(sales.id_typed())?.status(),
        outbound = outbound.outbound_number(),
        "scenario finished"
    );
    Ok(())
}
