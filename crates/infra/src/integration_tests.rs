//! Integration tests for the full operation pipeline.
//!
//! Tests: Operation → Transaction → Ledger → Commit → EventBus
//!
//! Verifies:
//! - Every state transition moves stock exactly once, or not at all
//! - Compensations reverse stock without erasing history
//! - Concurrent movements never oversell

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use millerp_core::{DomainError, Quantity};
    use millerp_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use millerp_inventory::{
        BatchStatus, Direction, ItemKind, MovementRequest, NewStockItem, StockItem, StockStatus,
        StockTakeOutcome, StockThresholds,
    };
    use millerp_production::{
        NewProcessStep, NewProductionOrder, Priority, ProcessStep, ProductionOrder, ProductionStatus,
        WeightLine,
    };
    use millerp_purchasing::{NewPurchaseOrder, PurchaseOrder, PurchaseStatus};
    use millerp_sales::{NewSalesOrder, OutboundLineInput, OutboundStatus, SalesOrder, SalesOrderStatus};

    use crate::clock::{Clock, FixedClock};
    use crate::config::ErpConfig;
    use crate::error::ServiceError;
    use crate::service::{ErpService, NewOutbound};

    type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;

    struct Plant {
        erp: ErpService<Bus>,
        clock: Arc<FixedClock>,
    }

    fn setup() -> Plant {
        setup_with(ErpConfig::default())
    }

    fn setup_with(config: ErpConfig) -> Plant {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 26, 9, 0, 0).unwrap()));
        let erp = ErpService::with_clock(config, bus, clock.clone());
        Plant { erp, clock }
    }

    fn qty(v: Decimal) -> Quantity {
        Quantity::new(v).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn domain(err: ServiceError) -> DomainError {
        match err {
            ServiceError::Domain(e) => e,
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    impl Plant {
        fn material(&self, code: &str) -> StockItem {
            self.erp
                .register_item(NewStockItem::material(code, format!("material {code}"), "kg"))
                .unwrap()
        }

        fn product(&self, code: &str) -> StockItem {
            self.erp
                .register_item(
                    NewStockItem::product(code, format!("product {code}"), "pcs").with_unit_weight(dec!(2.5)),
                )
                .unwrap()
        }

        fn stock(&self, item: &StockItem) -> Decimal {
            self.erp.item(item.id_typed()).unwrap().stock()
        }

        fn pending_purchase(&self, number: &str, lines: &[(&StockItem, Decimal)]) -> PurchaseOrder {
            let order = self
                .erp
                .create_purchase(NewPurchaseOrder {
                    purchase_number: number.to_string(),
                    supplier: "Acme Steel".to_string(),
                    purchase_date: self.clock.today(),
                    delivery_date: None,
                    notes: String::new(),
                })
                .unwrap();
            for (material, quantity) in lines {
                self.erp
                    .add_purchase_line(order.id_typed(), material.id_typed(), qty(*quantity), "")
                    .unwrap();
            }
            self.erp.submit_purchase(order.id_typed()).unwrap()
        }

        fn received_purchase(&self, number: &str, lines: &[(&StockItem, Decimal)]) -> PurchaseOrder {
            let order = self.pending_purchase(number, lines);
            self.erp.receive_purchase(order.id_typed()).unwrap()
        }

        fn sales_order(&self, number: &str) -> SalesOrder {
            self.erp
                .create_sales_order(NewSalesOrder {
                    order_number: number.to_string(),
                    customer: "Globex".to_string(),
                    customer_order_number: format!("C-{number}"),
                    order_date: day(20),
                    delivery_date: day(30),
                })
                .unwrap()
        }

        fn production(
            &self,
            number: &str,
            product: &StockItem,
            sales: Option<&SalesOrder>,
            planned: Decimal,
            requirements: &[(&StockItem, Decimal)],
        ) -> ProductionOrder {
            let order = self
                .erp
                .create_production_order(NewProductionOrder {
                    order_number: number.to_string(),
                    sales_order_id: sales.map(SalesOrder::id_typed),
                    product_id: product.id_typed(),
                    planned_quantity: qty(planned),
                    planned_start: day(26),
                    planned_end: None,
                    priority: Priority::High,
                    notes: String::new(),
                })
                .unwrap();
            for (material, required) in requirements {
                self.erp
                    .add_material_requirement(order.id_typed(), material.id_typed(), qty(*required), "")
                    .unwrap();
            }
            self.erp.production_order(order.id_typed()).unwrap()
        }

        fn in_production(&self, number: &str, product: &StockItem, planned: Decimal) -> ProductionOrder {
            let steel = self.material(&format!("{number}-M"));
            self.received_purchase(&format!("{number}-PO"), &[(&steel, dec!(10))]);
            let order = self.production(number, product, None, planned, &[(&steel, dec!(1))]);
            self.erp.mark_material_ready(order.id_typed()).unwrap();
            self.erp.start_production(order.id_typed()).unwrap()
        }

        fn stocked_product(&self, code: &str, quantity: Decimal) -> StockItem {
            let product = self.product(code);
            self.erp
                .post_movement(MovementRequest::inbound(product.id_typed(), qty(quantity), "opening balance"))
                .unwrap();
            self.erp.item(product.id_typed()).unwrap()
        }
    }

    // ---------------------------------------------------------------------
    // Purchasing
    // ---------------------------------------------------------------------

    #[test]
    fn purchase_to_production_scenario() {
        let plant = setup();
        let steel = plant.material("M");
        let bracket = plant.product("P");
        let sales = plant.sales_order("SO-1");

        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(100))]);
        assert_eq!(purchase.status(), PurchaseStatus::Received);
        assert_eq!(purchase.lines()[0].received_quantity, dec!(100));
        assert_eq!(plant.stock(&steel), dec!(100));

        let batches = plant.erp.batches_of(steel.id_typed()).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_number(), "PO-1-1");
        assert_eq!(batches[0].remaining(), dec!(100));

        let order = plant.production("MO-1", &bracket, Some(&sales), dec!(1), &[(&steel, dec!(40))]);
        let order = plant.erp.mark_material_ready(order.id_typed()).unwrap();
        assert_eq!(order.status(), ProductionStatus::MaterialReady);

        let order = plant.erp.start_production(order.id_typed()).unwrap();
        assert_eq!(order.status(), ProductionStatus::InProduction);
        assert_eq!(order.actual_start(), Some(day(26)));
        assert_eq!(order.requirements()[0].actual, dec!(40));
        assert_eq!(plant.erp.sales_order(sales.id_typed()).unwrap().status(), SalesOrderStatus::Processing);

        let batch = &plant.erp.batches_of(steel.id_typed()).unwrap()[0];
        assert_eq!(batch.remaining(), dec!(60));
        assert_eq!(plant.stock(&steel), dec!(60));

        let consumption = plant.erp.consumption_of(order.id_typed()).unwrap();
        assert_eq!(consumption.len(), 1);
        assert_eq!(consumption[0].quantity_used, qty(dec!(40)));
        assert_eq!(consumption[0].batch_number, "PO-1-1");

        let order = plant.erp.complete_production(order.id_typed(), qty(dec!(1))).unwrap();
        assert_eq!(order.status(), ProductionStatus::Completed);
        assert_eq!(plant.stock(&bracket), dec!(1));
        assert_eq!(plant.erp.sales_order(sales.id_typed()).unwrap().status(), SalesOrderStatus::Completed);
    }

    #[test]
    fn receiving_twice_fails_and_changes_nothing() {
        let plant = setup();
        let steel = plant.material("M");
        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(100))]);

        let err = domain(plant.erp.receive_purchase(purchase.id_typed()).unwrap_err());
        assert_eq!(err, DomainError::AlreadyReceived("PO-1".to_string()));

        assert_eq!(plant.stock(&steel), dec!(100));
        assert_eq!(plant.erp.batches_of(steel.id_typed()).unwrap().len(), 1);
        assert_eq!(plant.erp.movement_history(steel.id_typed()).unwrap().len(), 1);
    }

    #[test]
    fn receiving_a_draft_is_an_invalid_transition() {
        let plant = setup();
        let steel = plant.material("M");
        let draft = plant
            .erp
            .create_purchase(NewPurchaseOrder {
                purchase_number: "PO-9".to_string(),
                supplier: "Acme".to_string(),
                purchase_date: day(26),
                delivery_date: None,
                notes: String::new(),
            })
            .unwrap();
        plant
            .erp
            .add_purchase_line(draft.id_typed(), steel.id_typed(), qty(dec!(5)), "10mm")
            .unwrap();

        let err = domain(plant.erp.receive_purchase(draft.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(plant.stock(&steel), Decimal::ZERO);
    }

    #[test]
    fn cancel_receive_round_trip_keeps_history() {
        let plant = setup();
        let steel = plant.material("M");
        let copper = plant.material("C");
        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(100)), (&copper, dec!(20))]);

        let purchase = plant.erp.cancel_receive(purchase.id_typed()).unwrap();
        assert_eq!(purchase.status(), PurchaseStatus::Pending);
        assert!(purchase.lines().iter().all(|l| l.received_quantity.is_zero()));
        assert_eq!(plant.stock(&steel), Decimal::ZERO);
        assert_eq!(plant.stock(&copper), Decimal::ZERO);
        assert!(plant.erp.batches_of(steel.id_typed()).unwrap().is_empty());

        let history = plant.erp.movement_history(steel.id_typed()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].direction(), Direction::Out);
        assert_eq!(history[1].reverses(), Some(history[0].id_typed()));
        assert_eq!(history[1].reference(), "PO-1");

        // A reversed receipt no longer blocks receiving again.
        plant.erp.receive_purchase(purchase.id_typed()).unwrap();
        assert_eq!(plant.stock(&steel), dec!(100));
        assert_eq!(plant.erp.batches_of(steel.id_typed()).unwrap().len(), 1);
    }

    #[test]
    fn manual_postings_cannot_fake_a_receipt_reversal() {
        let plant = setup();
        let steel = plant.material("M");
        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(100))]);
        let receipt = plant.erp.movement_history(steel.id_typed()).unwrap().remove(0);

        let err = domain(
            plant
                .erp
                .post_movement(MovementRequest::reversal_of(&receipt, "PO-1"))
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));
        let batch = plant.erp.batches_of(steel.id_typed()).unwrap().remove(0);
        let err = domain(
            plant
                .erp
                .post_movement(MovementRequest::inbound(steel.id_typed(), qty(dec!(100)), "extra").batch(batch.id_typed()))
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(plant.stock(&steel), dec!(100));
        assert_eq!(plant.erp.movement_history(steel.id_typed()).unwrap().len(), 1);

        plant.erp.cancel_receive(purchase.id_typed()).unwrap();
        assert_eq!(plant.stock(&steel), Decimal::ZERO);
        assert!(plant.erp.batches_of(steel.id_typed()).unwrap().is_empty());
    }

    #[test]
    fn cancel_receive_is_refused_once_production_drew_from_a_batch() {
        let plant = setup();
        let steel = plant.material("M");
        let bracket = plant.product("P");
        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(100))]);
        let order = plant.production("MO-1", &bracket, None, dec!(1), &[(&steel, dec!(40))]);
        plant.erp.mark_material_ready(order.id_typed()).unwrap();
        plant.erp.start_production(order.id_typed()).unwrap();

        let err = domain(plant.erp.cancel_receive(purchase.id_typed()).unwrap_err());
        assert_eq!(err, DomainError::BatchInUse(vec!["PO-1-1".to_string()]));
        assert_eq!(plant.stock(&steel), dec!(60));
        assert_eq!(plant.erp.purchase(purchase.id_typed()).unwrap().status(), PurchaseStatus::Received);

        let err = domain(plant.erp.delete_purchase(purchase.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::BatchInUse(_)));
    }

    #[test]
    fn deleting_a_received_purchase_compensates_its_receipt() {
        let plant = setup();
        let steel = plant.material("M");
        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(100))]);

        plant.erp.delete_purchase(purchase.id_typed()).unwrap();

        assert!(matches!(
            domain(plant.erp.purchase(purchase.id_typed()).unwrap_err()),
            DomainError::NotFound(_)
        ));
        assert_eq!(plant.stock(&steel), Decimal::ZERO);
        assert!(plant.erp.batches_of(steel.id_typed()).unwrap().is_empty());
        assert_eq!(plant.erp.movement_history(steel.id_typed()).unwrap().len(), 2);
    }

    #[test]
    fn purchase_lifecycle_transitions() {
        let plant = setup();
        let steel = plant.material("M");

        let purchase = plant.received_purchase("PO-1", &[(&steel, dec!(5))]);
        let purchase = plant.erp.complete_purchase(purchase.id_typed()).unwrap();
        assert_eq!(purchase.status(), PurchaseStatus::Completed);
        let err = domain(plant.erp.cancel_purchase(purchase.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

        let other = plant.pending_purchase("PO-2", &[(&steel, dec!(5))]);
        let other = plant.erp.cancel_purchase(other.id_typed()).unwrap();
        assert_eq!(other.status(), PurchaseStatus::Cancelled);
        assert_eq!(plant.stock(&steel), dec!(5));

        let err = domain(
            plant
                .erp
                .create_purchase(NewPurchaseOrder {
                    purchase_number: "PO-1".to_string(),
                    supplier: "Acme".to_string(),
                    purchase_date: day(26),
                    delivery_date: None,
                    notes: String::new(),
                })
                .unwrap_err(),
        );
        assert!(err.is_conflict());
    }

    #[test]
    fn empty_purchase_cannot_be_submitted() {
        let plant = setup();
        let draft = plant
            .erp
            .create_purchase(NewPurchaseOrder {
                purchase_number: "PO-1".to_string(),
                supplier: "Acme".to_string(),
                purchase_date: day(26),
                delivery_date: None,
                notes: String::new(),
            })
            .unwrap();

        let err = domain(plant.erp.submit_purchase(draft.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::EmptyOrder(_)));
    }

    // ---------------------------------------------------------------------
    // Production
    // ---------------------------------------------------------------------

    #[test]
    fn allocation_takes_the_oldest_batch_first() {
        let plant = setup();
        let steel = plant.material("M");
        let bracket = plant.product("P");
        plant.received_purchase("PO-1", &[(&steel, dec!(5))]);
        plant.clock.advance(Duration::days(1));
        plant.received_purchase("PO-2", &[(&steel, dec!(10))]);

        let order = plant.production("MO-1", &bracket, None, dec!(1), &[(&steel, dec!(7))]);
        plant.erp.mark_material_ready(order.id_typed()).unwrap();
        plant.erp.start_production(order.id_typed()).unwrap();

        let taken: Vec<_> = plant
            .erp
            .consumption_of(order.id_typed())
            .unwrap()
            .into_iter()
            .map(|c| (c.batch_number, c.quantity_used.value()))
            .collect();
        assert_eq!(taken, vec![("PO-1-1".to_string(), dec!(5)), ("PO-2-1".to_string(), dec!(2))]);

        let batches = plant.erp.batches_of(steel.id_typed()).unwrap();
        assert_eq!(batches[0].status(), BatchStatus::Depleted);
        assert_eq!(batches[1].remaining(), dec!(8));
    }

    #[test]
    fn material_ready_reports_every_shortage() {
        let plant = setup();
        let steel = plant.material("M");
        let copper = plant.material("C");
        let bracket = plant.product("P");
        plant.received_purchase("PO-1", &[(&steel, dec!(3))]);

        let order = plant.production(
            "MO-1",
            &bracket,
            None,
            dec!(1),
            &[(&steel, dec!(5)), (&copper, dec!(2))],
        );
        let err = domain(plant.erp.mark_material_ready(order.id_typed()).unwrap_err());

        let DomainError::InsufficientMaterial(shortages) = err else {
            panic!("expected InsufficientMaterial, got {err:?}");
        };
        assert_eq!(shortages.len(), 2);
        assert_eq!(shortages[0].available, dec!(3));
        assert_eq!(shortages[1].required, dec!(2));
        assert_eq!(
            plant.erp.production_order(order.id_typed()).unwrap().status(),
            ProductionStatus::Pending
        );
    }

    #[test]
    fn start_production_consumes_all_or_nothing() {
        let plant = setup();
        let steel = plant.material("M");
        let copper = plant.material("C");
        let bracket = plant.product("P");
        plant.received_purchase("PO-1", &[(&steel, dec!(50))]);
        // Stock without batches: passes the aggregate gate, fails allocation.
        plant
            .erp
            .post_movement(MovementRequest::inbound(copper.id_typed(), qty(dec!(10)), "opening balance"))
            .unwrap();

        let order = plant.production(
            "MO-1",
            &bracket,
            None,
            dec!(1),
            &[(&steel, dec!(20)), (&copper, dec!(4))],
        );
        plant.erp.mark_material_ready(order.id_typed()).unwrap();
        let err = domain(plant.erp.start_production(order.id_typed()).unwrap_err());

        assert!(matches!(err, DomainError::InsufficientBatchStock { shortfall, .. } if shortfall == dec!(4)));
        assert_eq!(plant.stock(&steel), dec!(50));
        assert_eq!(plant.erp.batches_of(steel.id_typed()).unwrap()[0].remaining(), dec!(50));
        assert!(plant.erp.consumption_of(order.id_typed()).unwrap().is_empty());
        assert_eq!(
            plant.erp.production_order(order.id_typed()).unwrap().status(),
            ProductionStatus::MaterialReady
        );
    }

    #[test]
    fn starting_a_pending_order_is_an_invalid_transition() {
        let plant = setup();
        let steel = plant.material("M");
        let bracket = plant.product("P");
        plant.received_purchase("PO-1", &[(&steel, dec!(50))]);
        let order = plant.production("MO-1", &bracket, None, dec!(1), &[(&steel, dec!(20))]);

        let err = domain(plant.erp.start_production(order.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(plant.stock(&steel), dec!(50));
    }

    #[test]
    fn progress_accumulates_and_only_the_latest_can_be_cancelled() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.in_production("MO-1", &bracket, dec!(100));

        let records: Vec<_> = [dec!(10), dec!(15), dec!(5)]
            .into_iter()
            .map(|q| plant.erp.record_progress(order.id_typed(), qty(q), "shift").unwrap())
            .collect();
        let accumulated: Vec<_> = records.iter().map(|r| r.accumulated()).collect();
        assert_eq!(accumulated, vec![dec!(10), dec!(25), dec!(30)]);

        let current = plant.erp.production_order(order.id_typed()).unwrap();
        assert_eq!(current.progress(), dec!(30.00));
        assert_eq!(current.completed_quantity(), dec!(30));

        let err = domain(plant.erp.cancel_progress(records[1].id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::Validation(_)));

        let current = plant.erp.cancel_progress(records[2].id_typed()).unwrap();
        assert_eq!(current.completed_quantity(), dec!(25));
        assert_eq!(current.progress(), dec!(25.00));

        let history = plant.erp.progress_history(order.id_typed()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().map(|p| p.accumulated()), Some(dec!(25)));
    }

    #[test]
    fn progress_requires_production_to_be_running() {
        let plant = setup();
        let steel = plant.material("M");
        let bracket = plant.product("P");
        let order = plant.production("MO-1", &bracket, None, dec!(10), &[(&steel, dec!(1))]);

        let err = domain(plant.erp.record_progress(order.id_typed(), qty(dec!(1)), "").unwrap_err());
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn completion_books_finished_goods_once_and_can_be_reversed() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.in_production("MO-1", &bracket, dec!(10));

        plant.erp.complete_production(order.id_typed(), qty(dec!(10))).unwrap();
        assert_eq!(plant.stock(&bracket), dec!(10));
        let err = domain(plant.erp.complete_production(order.id_typed(), qty(dec!(10))).unwrap_err());
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(plant.stock(&bracket), dec!(10));

        let reopened = plant.erp.cancel_completion(order.id_typed()).unwrap();
        assert_eq!(reopened.status(), ProductionStatus::InProduction);
        assert_eq!(reopened.actual_end(), None);
        assert_eq!(reopened.completed_quantity(), Decimal::ZERO);
        assert_eq!(plant.stock(&bracket), Decimal::ZERO);

        plant.erp.complete_production(order.id_typed(), qty(dec!(8))).unwrap();
        assert_eq!(plant.stock(&bracket), dec!(8));
        let history = plant.erp.movement_history(bracket.id_typed()).unwrap();
        let directions: Vec<_> = history.iter().map(|m| m.direction()).collect();
        assert_eq!(directions, vec![Direction::In, Direction::Out, Direction::In]);
    }

    #[test]
    fn cancel_completion_fails_when_goods_already_shipped() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.in_production("MO-1", &bracket, dec!(5));
        plant.erp.complete_production(order.id_typed(), qty(dec!(5))).unwrap();

        let outbound = plant
            .erp
            .create_outbound(NewOutbound {
                lines: vec![OutboundLineInput {
                    product_id: bracket.id_typed(),
                    quantity: qty(dec!(4)),
                    notes: String::new(),
                }],
                ..NewOutbound::default()
            })
            .unwrap();
        plant.erp.confirm_outbound(outbound.id_typed()).unwrap();

        let err = domain(plant.erp.cancel_completion(order.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(
            plant.erp.production_order(order.id_typed()).unwrap().status(),
            ProductionStatus::Completed
        );
    }

    #[test]
    fn full_completion_can_be_enforced_by_configuration() {
        let plant = setup_with(ErpConfig {
            require_full_completion: true,
            ..ErpConfig::default()
        });
        let bracket = plant.product("P");
        let order = plant.in_production("MO-1", &bracket, dec!(100));

        let err = domain(plant.erp.complete_production(order.id_typed(), qty(dec!(50))).unwrap_err());
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(plant.stock(&bracket), Decimal::ZERO);
    }

    #[test]
    fn a_sales_order_links_to_one_production_order() {
        let plant = setup();
        let bracket = plant.product("P");
        let sales = plant.sales_order("SO-1");
        plant.production("MO-1", &bracket, Some(&sales), dec!(1), &[]);

        let err = domain(
            plant
                .erp
                .create_production_order(NewProductionOrder {
                    order_number: "MO-2".to_string(),
                    sales_order_id: Some(sales.id_typed()),
                    product_id: bracket.id_typed(),
                    planned_quantity: qty(dec!(1)),
                    planned_start: day(26),
                    planned_end: None,
                    priority: Priority::Low,
                    notes: String::new(),
                })
                .unwrap_err(),
        );
        assert!(err.is_conflict());
    }

    #[test]
    fn delay_days_compare_finish_with_plan() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.in_production("MO-1", &bracket, dec!(1));
        assert_eq!(plant.erp.delay_days(order.id_typed()).unwrap(), 0);

        // Planned end is a week after the 26th; finish on the 5th of July.
        plant.clock.advance(Duration::days(9));
        plant.erp.complete_production(order.id_typed(), qty(dec!(1))).unwrap();
        assert_eq!(plant.erp.delay_days(order.id_typed()).unwrap(), 2);
    }

    fn routing_step(plant: &Plant, code: &str, sequence: u32, capacity: Decimal) -> ProcessStep {
        plant
            .erp
            .define_process_step(NewProcessStep {
                code: code.to_string(),
                name: format!("step {code}"),
                sequence,
                daily_capacity: capacity,
                is_bottleneck: false,
                notes: String::new(),
            })
            .unwrap()
    }

    #[test]
    fn process_plan_chains_steps_from_now_and_replaces_the_last_plan() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.production("MO-1", &bracket, None, dec!(120), &[]);
        routing_step(&plant, "WELD", 2, dec!(50));
        routing_step(&plant, "CUT", 1, dec!(60));

        let start = plant.clock.now();
        let plan = plant.erp.schedule_processes(order.id_typed()).unwrap();
        assert_eq!(plan.len(), 2);
        // CUT: 2 days, WELD: ceil(120/50) = 3 days, 10 hours each.
        assert_eq!(plan[0].step_code, "CUT");
        assert_eq!(plan[0].planned_start, start);
        assert_eq!(plan[0].planned_end, start + Duration::hours(20));
        assert_eq!(plan[1].planned_start, plan[0].planned_end);
        assert_eq!(plan[1].planned_end, start + Duration::hours(50));

        plant.clock.advance(Duration::days(1));
        let replanned = plant.erp.schedule_processes(order.id_typed()).unwrap();
        let stored = plant.erp.process_schedule(order.id_typed()).unwrap();
        assert_eq!(stored, replanned);
        assert_eq!(stored[0].planned_start, start + Duration::days(1));
    }

    #[test]
    fn zero_capacity_step_blocks_scheduling_and_keeps_the_old_plan() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.production("MO-1", &bracket, None, dec!(10), &[]);
        routing_step(&plant, "CUT", 1, dec!(5));
        let before = plant.erp.schedule_processes(order.id_typed()).unwrap();

        routing_step(&plant, "PAINT", 2, Decimal::ZERO);
        let err = domain(plant.erp.schedule_processes(order.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(plant.erp.process_schedule(order.id_typed()).unwrap(), before);
    }

    #[test]
    fn scheduling_needs_a_routing_with_unique_steps() {
        let plant = setup();
        let bracket = plant.product("P");
        let order = plant.production("MO-1", &bracket, None, dec!(10), &[]);
        let err = domain(plant.erp.schedule_processes(order.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::Validation(_)));

        routing_step(&plant, "CUT", 1, dec!(5));
        let duplicate = plant.erp.define_process_step(NewProcessStep {
            code: "CUT2".to_string(),
            name: "second cut".to_string(),
            sequence: 1,
            daily_capacity: dec!(5),
            is_bottleneck: true,
            notes: String::new(),
        });
        assert!(matches!(domain(duplicate.unwrap_err()), DomainError::Conflict(_)));
        assert_eq!(plant.erp.process_steps().unwrap().len(), 1);
    }

    // ---------------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------------

    #[test]
    fn confirming_beyond_stock_fails_without_movements() {
        let plant = setup();
        let bracket = plant.stocked_product("P", dec!(3));
        let outbound = plant
            .erp
            .create_outbound(NewOutbound {
                lines: vec![OutboundLineInput {
                    product_id: bracket.id_typed(),
                    quantity: qty(dec!(5)),
                    notes: String::new(),
                }],
                ..NewOutbound::default()
            })
            .unwrap();

        let err = domain(plant.erp.confirm_outbound(outbound.id_typed()).unwrap_err());
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                item: bracket.label(),
                available: dec!(3),
                requested: dec!(5),
            }
        );
        assert_eq!(plant.stock(&bracket), dec!(3));
        assert_eq!(plant.erp.movement_history(bracket.id_typed()).unwrap().len(), 1);
        assert_eq!(plant.erp.outbound(outbound.id_typed()).unwrap().status(), OutboundStatus::Draft);
    }

    #[test]
    fn confirm_then_cancel_restores_stock_with_tagged_reversals() {
        let plant = setup();
        let bracket = plant.stocked_product("P", dec!(10));
        let plate = plant.stocked_product("Q", dec!(4));
        let outbound = plant
            .erp
            .create_outbound(NewOutbound {
                lines: vec![
                    OutboundLineInput {
                        product_id: bracket.id_typed(),
                        quantity: qty(dec!(6)),
                        notes: String::new(),
                    },
                    OutboundLineInput {
                        product_id: plate.id_typed(),
                        quantity: qty(dec!(4)),
                        notes: String::new(),
                    },
                ],
                ..NewOutbound::default()
            })
            .unwrap();
        assert_eq!(outbound.outbound_number(), "20250626001");

        plant.erp.confirm_outbound(outbound.id_typed()).unwrap();
        assert_eq!(plant.stock(&bracket), dec!(4));
        assert_eq!(plant.stock(&plate), Decimal::ZERO);
        assert_eq!(plant.erp.stock_status(plate.id_typed()).unwrap(), StockStatus::Danger);

        let cancelled = plant.erp.cancel_outbound(outbound.id_typed()).unwrap();
        assert_eq!(cancelled.status(), OutboundStatus::Cancelled);
        assert_eq!(plant.stock(&bracket), dec!(10));
        assert_eq!(plant.stock(&plate), dec!(4));

        let history = plant.erp.movement_history(bracket.id_typed()).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].reference(), "cancelled-20250626001");
        assert_eq!(history[2].reverses(), Some(history[1].id_typed()));

        let err = domain(plant.erp.cancel_outbound(outbound.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn outbound_numbers_follow_the_day_sequence() {
        let plant = setup();
        let first = plant.erp.create_outbound(NewOutbound::default()).unwrap();
        let second = plant.erp.create_outbound(NewOutbound::default()).unwrap();
        let other_day = plant
            .erp
            .create_outbound(NewOutbound {
                outbound_date: Some(day(27)),
                ..NewOutbound::default()
            })
            .unwrap();

        assert_eq!(first.outbound_number(), "20250626001");
        assert_eq!(second.outbound_number(), "20250626002");
        assert_eq!(other_day.outbound_number(), "20250627001");

        let err = domain(
            plant
                .erp
                .create_outbound(NewOutbound {
                    outbound_number: Some("20250626002".to_string()),
                    ..NewOutbound::default()
                })
                .unwrap_err(),
        );
        assert!(err.is_conflict());

        let err = domain(plant.erp.confirm_outbound(first.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::EmptyOrder(_)));
    }

    #[test]
    fn line_edits_on_a_confirmed_outbound_move_stock_incrementally() {
        let plant = setup();
        let bracket = plant.stocked_product("P", dec!(10));
        let plate = plant.stocked_product("Q", dec!(10));
        let outbound = plant
            .erp
            .create_outbound(NewOutbound {
                lines: vec![OutboundLineInput {
                    product_id: bracket.id_typed(),
                    quantity: qty(dec!(2)),
                    notes: String::new(),
                }],
                ..NewOutbound::default()
            })
            .unwrap();

        // Draft edits never touch stock.
        let draft = plant
            .erp
            .add_outbound_line(
                outbound.id_typed(),
                OutboundLineInput {
                    product_id: plate.id_typed(),
                    quantity: qty(dec!(1)),
                    notes: String::new(),
                },
            )
            .unwrap();
        assert_eq!(plant.stock(&plate), dec!(10));
        plant.erp.remove_outbound_line(outbound.id_typed(), draft.lines()[1].line_no).unwrap();

        plant.erp.confirm_outbound(outbound.id_typed()).unwrap();
        assert_eq!(plant.stock(&bracket), dec!(8));

        let confirmed = plant
            .erp
            .add_outbound_line(
                outbound.id_typed(),
                OutboundLineInput {
                    product_id: plate.id_typed(),
                    quantity: qty(dec!(3)),
                    notes: "late addition".to_string(),
                },
            )
            .unwrap();
        assert_eq!(plant.stock(&plate), dec!(7));

        let plate_line = confirmed
            .lines()
            .iter()
            .find(|l| l.product_id == plate.id_typed())
            .map(|l| l.line_no)
            .unwrap();
        plant.erp.remove_outbound_line(outbound.id_typed(), plate_line).unwrap();
        assert_eq!(plant.stock(&plate), dec!(10));
        assert_eq!(plant.stock(&bracket), dec!(8));

        plant.erp.cancel_outbound(outbound.id_typed()).unwrap();
        assert_eq!(plant.stock(&bracket), dec!(10));
        assert_eq!(plant.stock(&plate), dec!(10));
    }

    #[test]
    fn materials_cannot_be_shipped() {
        let plant = setup();
        let steel = plant.material("M");
        let err = domain(
            plant
                .erp
                .create_outbound(NewOutbound {
                    lines: vec![OutboundLineInput {
                        product_id: steel.id_typed(),
                        quantity: qty(dec!(1)),
                        notes: String::new(),
                    }],
                    ..NewOutbound::default()
                })
                .unwrap_err(),
        );
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(plant.erp.outbounds().unwrap().is_empty());
    }

    // ---------------------------------------------------------------------
    // Stock, stocktake, housekeeping
    // ---------------------------------------------------------------------

    #[test]
    fn stocktake_resolves_differences_into_movements() {
        let plant = setup();
        let steel = plant.material("M");
        let copper = plant.material("C");
        plant.received_purchase("PO-1", &[(&steel, dec!(100)), (&copper, dec!(10))]);

        let take = plant.erp.create_stocktake("ST-1", day(26)).unwrap();
        plant.erp.count_material(take.id_typed(), steel.id_typed(), dec!(97), "").unwrap();
        plant.erp.count_material(take.id_typed(), copper.id_typed(), dec!(11), "").unwrap();
        let err = domain(
            plant
                .erp
                .count_material(take.id_typed(), steel.id_typed(), dec!(1), "")
                .unwrap_err(),
        );
        assert!(err.is_conflict());

        let confirmed = plant.erp.confirm_stocktake(take.id_typed()).unwrap();
        assert_eq!(confirmed.outcome(), StockTakeOutcome::Loss);
        assert_eq!(confirmed.total_difference(), dec!(-2));
        assert_eq!(plant.stock(&steel), dec!(97));
        assert_eq!(plant.stock(&copper), dec!(11));

        let history = plant.erp.movement_history(steel.id_typed()).unwrap();
        let kinds: Vec<_> = history.iter().map(|m| (m.direction(), m.reference().to_string())).collect();
        assert_eq!(
            kinds,
            vec![
                (Direction::In, "PO-1".to_string()),
                (Direction::Adjust, "ST-1".to_string()),
                (Direction::Out, "ST-1".to_string()),
            ]
        );

        let err = domain(plant.erp.cancel_stocktake(take.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn expired_batches_are_not_allocated() {
        let plant = setup();
        let steel = plant.material("M");
        let bracket = plant.product("P");
        plant.received_purchase("PO-1", &[(&steel, dec!(50))]);
        let batch = plant.erp.batches_of(steel.id_typed()).unwrap().remove(0);

        plant.erp.set_batch_expiry(batch.id_typed(), Some(day(27))).unwrap();
        assert!(plant.erp.expire_batches(day(27)).unwrap().is_empty());
        let expired = plant.erp.expire_batches(day(28)).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status(), BatchStatus::Expired);

        let order = plant.production("MO-1", &bracket, None, dec!(1), &[(&steel, dec!(10))]);
        plant.erp.mark_material_ready(order.id_typed()).unwrap();
        let err = domain(plant.erp.start_production(order.id_typed()).unwrap_err());
        assert!(matches!(err, DomainError::InsufficientBatchStock { .. }));
    }

    #[test]
    fn referenced_items_cannot_be_deleted() {
        let plant = setup();
        let steel = plant.material("M");
        let spare = plant.material("S");
        plant.received_purchase("PO-1", &[(&steel, dec!(1))]);

        let err = domain(plant.erp.delete_item(steel.id_typed()).unwrap_err());
        assert!(err.is_conflict());

        plant.erp.delete_item(spare.id_typed()).unwrap();
        assert_eq!(plant.erp.items(Some(ItemKind::Material)).unwrap().len(), 1);

        let err = domain(plant.erp.register_item(NewStockItem::material("M", "dup", "kg")).unwrap_err());
        assert!(err.is_conflict());
    }

    #[test]
    fn alerts_and_daily_statistics_follow_the_ledger() {
        let plant = setup();
        let steel = plant
            .erp
            .register_item(NewStockItem::material("M", "Steel", "kg").with_thresholds(StockThresholds {
                min: dec!(5),
                warning: dec!(20),
                max: dec!(500),
            }))
            .unwrap();
        plant.received_purchase("PO-1", &[(&steel, dec!(30))]);

        plant.clock.advance(Duration::days(1));
        plant
            .erp
            .post_movement(MovementRequest::outbound(steel.id_typed(), qty(dec!(12)), "scrap"))
            .unwrap();

        let alerts = plant.erp.stock_alerts().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(plant.erp.stock_status(steel.id_typed()).unwrap(), StockStatus::Warning);

        let stats = plant.erp.daily_statistics(steel.id_typed(), day(27)).unwrap();
        assert_eq!(stats.opening, dec!(30));
        assert_eq!(stats.incoming, Decimal::ZERO);
        assert_eq!(stats.outgoing, dec!(12));
        assert_eq!(stats.closing, dec!(18));
    }

    #[test]
    fn weight_estimate_uses_catalog_unit_weights() {
        let plant = setup();
        let bracket = plant.product("P");
        let estimate = plant
            .erp
            .estimate_material_weight(&[WeightLine {
                product_id: bracket.id_typed(),
                quantity: dec!(4),
            }])
            .unwrap();

        assert!(estimate.is_complete());
        assert_eq!(estimate.total_weight, dec!(10.0));
    }

    // ---------------------------------------------------------------------
    // Publication and concurrency
    // ---------------------------------------------------------------------

    #[test]
    fn events_are_published_only_after_commit() {
        let plant = setup();
        let steel = plant.material("M");
        let purchase = plant.pending_purchase("PO-1", &[(&steel, dec!(10))]);
        let subscription = plant.erp.subscribe();

        plant.erp.receive_purchase(purchase.id_typed()).unwrap();
        let types: Vec<_> = subscription
            .drain()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            types,
            vec![
                "inventory.batch.opened",
                "inventory.stock.moved",
                "purchasing.order.received",
            ]
        );

        assert!(plant.erp.receive_purchase(purchase.id_typed()).is_err());
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn envelope_sequence_numbers_increase_in_commit_order() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let subscription = bus.subscribe();
        let erp = ErpService::new(ErpConfig::default(), bus);
        for code in ["A", "B", "C"] {
            erp.register_item(NewStockItem::material(code, code, "kg")).unwrap();
        }

        let sequence: Vec<_> = subscription.drain().iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
    }

    #[test]
    fn concurrent_outs_never_oversell() {
        let plant = Arc::new(setup());
        let bracket = plant.stocked_product("P", dec!(10));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let plant = Arc::clone(&plant);
                let id = bracket.id_typed();
                std::thread::spawn(move || {
                    plant
                        .erp
                        .post_movement(MovementRequest::outbound(id, qty(dec!(1.5)), "pick"))
                        .is_ok()
                })
            })
            .collect();
        let shipped = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(shipped, 6);
        assert_eq!(plant.stock(&bracket), dec!(1.0));
    }

    #[test]
    fn writers_on_distinct_items_all_succeed_over_a_long_ledger() {
        let plant = Arc::new(setup());
        let filler = plant.material("FILL");
        for _ in 0..5_000 {
            plant
                .erp
                .post_movement(MovementRequest::inbound(filler.id_typed(), qty(dec!(1)), "seed"))
                .unwrap();
        }
        let items: Vec<_> = (0..8).map(|w| plant.material(&format!("W{w}"))).collect();

        let handles: Vec<_> = items
            .iter()
            .map(|item| {
                let plant = Arc::clone(&plant);
                let id = item.id_typed();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| {
                            plant
                                .erp
                                .post_movement(MovementRequest::inbound(id, qty(dec!(1)), "receipt"))
                                .is_ok()
                        })
                        .count()
                })
            })
            .collect();
        let posted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(posted, 400);
        for item in &items {
            assert_eq!(plant.stock(item), dec!(50));
        }
        assert_eq!(plant.stock(&filler), dec!(5000));
    }
}
