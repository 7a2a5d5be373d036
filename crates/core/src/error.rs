//! Domain error model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One material that cannot cover its requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialShortage {
    pub material: String,
    pub required: Decimal,
    pub available: Decimal,
}

impl core::fmt::Display for MaterialShortage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} (required {}, available {})",
            self.material, self.required, self.available
        )
    }
}

fn join_shortages(shortages: &[MaterialShortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. stale version / duplicate number).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Aggregate stock of an item cannot cover an outgoing movement.
    #[error("insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: Decimal,
        requested: Decimal,
    },

    /// FIFO allocation ran out of usable batches.
    #[error("insufficient batch stock for {material}: short by {shortfall}")]
    InsufficientBatchStock { material: String, shortfall: Decimal },

    /// Material readiness failed; lists every short material.
    #[error("insufficient material: {}", join_shortages(.0))]
    InsufficientMaterial(Vec<MaterialShortage>),

    /// The requested operation is not legal from the current status.
    #[error("cannot {operation} {entity} in status '{from}'")]
    InvalidStateTransition {
        entity: String,
        from: String,
        operation: String,
    },

    /// The purchase already has live receipt movements.
    #[error("purchase {0} has already been received")]
    AlreadyReceived(String),

    /// Batches created by a purchase were consumed by production.
    #[error("batches already consumed by production: {}", .0.join(", "))]
    BatchInUse(Vec<String>),

    /// The order has no lines to act on.
    #[error("{0} has no lines")]
    EmptyOrder(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl core::fmt::Display,
        operation: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            entity: entity.into(),
            from: from.to_string(),
            operation: operation.into(),
        }
    }

    /// Whether the error is a stale-state conflict worth re-running against fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
