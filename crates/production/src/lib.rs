//! Production domain module.
//!
//! Production orders with their bill of materials, the progress log,
//! batch consumption audit rows, the sales-order projection rule, process
//! scheduling and material weight estimation. Consumption itself
//! (allocation plus ledger movements) is orchestrated by the
//! infrastructure layer.

pub mod consumption;
pub mod events;
pub mod order;
pub mod progress;
pub mod projection;
pub mod schedule;
pub mod weight;

pub use consumption::{ConsumptionId, ProductionMaterial};
pub use events::{
    ConsumedBatch, MaterialsConsumed, ProcessesScheduled, ProductionEvent, ProductionStatusChanged,
    ProgressCancelled, ProgressRecorded,
};
pub use order::{
    DEFAULT_PLANNED_DAYS, MaterialRequirement, NewProductionOrder, Priority, ProductionAction,
    ProductionOrder, ProductionOrderId, ProductionStatus,
};
pub use progress::{ProductionProgress, ProgressId, percentage};
pub use projection::projected_sales_status;
pub use schedule::{
    NewProcessStep, ProcessSchedule, ProcessStep, ProcessStepId, ScheduleId, WORK_HOURS_PER_DAY,
    schedule_processes,
};
pub use weight::{ProductWeight, WeightEstimate, WeightLine, estimate_material_weight};
