//! Process steps and the per-order process plan.
//!
//! A step needs `ceil(planned / daily_capacity)` working days of
//! [`WORK_HOURS_PER_DAY`] hours each, and every step starts when the one
//! before it ends.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity};

use crate::order::{ProductionOrder, ProductionOrderId};

millerp_core::typed_id!(
    /// Process step identifier.
    ProcessStepId
);

millerp_core::typed_id!(
    /// Process schedule row identifier.
    ScheduleId
);

pub const WORK_HOURS_PER_DAY: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProcessStep {
    pub code: String,
    pub name: String,
    pub sequence: u32,
    /// Units the step finishes per working day.
    pub daily_capacity: Decimal,
    pub is_bottleneck: bool,
    #[serde(default)]
    pub notes: String,
}

/// One step of the shop's routing, shared by every production order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessStep {
    id: ProcessStepId,
    code: String,
    name: String,
    sequence: u32,
    daily_capacity: Decimal,
    is_bottleneck: bool,
    notes: String,
    created_at: DateTime<Utc>,
}

impl ProcessStep {
    /// A step with no capacity can be defined but not scheduled.
    pub fn create(id: ProcessStepId, input: NewProcessStep, at: DateTime<Utc>) -> DomainResult<Self> {
        let code = input.code.trim();
        let name = input.name.trim();
        if code.is_empty() || name.is_empty() {
            return Err(DomainError::validation("process step needs a code and a name"));
        }
        if input.daily_capacity.is_sign_negative() {
            return Err(DomainError::validation(format!(
                "daily capacity of {code} cannot be negative"
            )));
        }

        Ok(Self {
            id,
            code: code.to_string(),
            name: name.to_string(),
            sequence: input.sequence,
            daily_capacity: input.daily_capacity,
            is_bottleneck: input.is_bottleneck,
            notes: input.notes,
            created_at: at,
        })
    }

    pub fn id_typed(&self) -> ProcessStepId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn daily_capacity(&self) -> Decimal {
        self.daily_capacity
    }

    pub fn is_bottleneck(&self) -> bool {
        self.is_bottleneck
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Working hours this step needs for `planned` units.
    pub fn hours_for(&self, planned: Decimal) -> DomainResult<i64> {
        if self.daily_capacity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "process step {} has no daily capacity",
                self.code
            )));
        }
        (planned / self.daily_capacity)
            .ceil()
            .to_i64()
            .and_then(|days| days.checked_mul(WORK_HOURS_PER_DAY))
            .ok_or_else(|| DomainError::validation(format!("process step {} needs too many days", self.code)))
    }
}

impl Entity for ProcessStep {
    type Id = ProcessStepId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Planned window of one step for one production order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSchedule {
    pub id: ScheduleId,
    pub order_id: ProductionOrderId,
    pub step_id: ProcessStepId,
    pub step_code: String,
    pub sequence: u32,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Entity for ProcessSchedule {
    type Id = ScheduleId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Lay out every step back to back from `start`, in step sequence.
///
/// Fails without a partial plan when no step exists or any step lacks
/// capacity.
pub fn schedule_processes<'a>(
    order: &ProductionOrder,
    steps: impl IntoIterator<Item = &'a ProcessStep>,
    start: DateTime<Utc>,
) -> DomainResult<Vec<ProcessSchedule>> {
    let mut steps: Vec<&ProcessStep> = steps.into_iter().collect();
    if steps.is_empty() {
        return Err(DomainError::validation("no process steps are defined"));
    }
    steps.sort_by_key(|s| s.sequence);

    let planned = order.planned_quantity().value();
    let mut cursor = start;
    let mut plan = Vec::with_capacity(steps.len());
    for step in steps {
        let hours = step.hours_for(planned)?;
        let end = Duration::try_hours(hours)
            .and_then(|d| cursor.checked_add_signed(d))
            .ok_or_else(|| DomainError::validation(format!("schedule of {} runs out of range", step.code)))?;
        plan.push(ProcessSchedule {
            id: ScheduleId::generate(),
            order_id: order.id_typed(),
            step_id: step.id,
            step_code: step.code.clone(),
            sequence: step.sequence,
            planned_start: cursor,
            planned_end: end,
            created_at: start,
        });
        cursor = end;
    }
    Ok(plan)
}
