//! Value objects: equality by value, not identity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive, exact decimal quantity.
///
/// Every movement, order line and progress increment carries a `Quantity`;
/// running totals such as stock levels stay plain [`Decimal`]s because they may
/// legitimately be zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be positive, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> Decimal {
        self.0
    }

    /// `Some(quantity)` when `value` is positive, `None` otherwise.
    pub fn positive(value: Decimal) -> Option<Self> {
        Self::new(value).ok()
    }
}

impl ValueObject for Quantity {}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        assert!(matches!(Quantity::new(dec!(0)), Err(DomainError::Validation(_))));
        assert!(matches!(Quantity::new(dec!(-1.5)), Err(DomainError::Validation(_))));
        assert_eq!(Quantity::new(dec!(0.01)).unwrap().value(), dec!(0.01));
    }

    #[test]
    fn deserialization_enforces_positivity() {
        let ok: Quantity = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(ok.value(), dec!(12.50));

        let err = serde_json::from_str::<Quantity>("\"0\"");
        assert!(err.is_err());
    }

    #[test]
    fn repeated_small_additions_do_not_drift() {
        let step = Quantity::new(dec!(0.1)).unwrap();
        let total = (0..1000).fold(Decimal::ZERO, |acc, _| acc + step.value());
        assert_eq!(total, dec!(100));
    }
}
