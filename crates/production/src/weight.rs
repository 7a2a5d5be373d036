//! Raw material weight estimation from product quantities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_inventory::{ItemKind, StockItem, StockItemId};

/// Requested product quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightLine {
    pub product_id: StockItemId,
    pub quantity: Decimal,
}

/// Per-product totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWeight {
    pub product_id: StockItemId,
    pub code: String,
    pub name: String,
    pub unit_weight: Decimal,
    pub total_quantity: Decimal,
    pub total_weight: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEstimate {
    pub products: Vec<ProductWeight>,
    /// Total in kg.
    pub total_weight: Decimal,
    /// One message per rejected line; valid lines are still counted.
    pub errors: Vec<String>,
}

impl WeightEstimate {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Σ `unit_weight × quantity`, grouped by product in first-seen order.
///
/// Invalid lines (non-positive quantity, unknown or inactive product, not a
/// finished product) are reported and skipped. A product without a unit
/// weight counts as weightless.
pub fn estimate_material_weight<'a>(
    lines: &[WeightLine],
    product: impl Fn(StockItemId) -> Option<&'a StockItem>,
) -> WeightEstimate {
    let mut estimate = WeightEstimate::default();

    for (index, line) in lines.iter().enumerate() {
        let row = index + 1;
        if line.quantity <= Decimal::ZERO {
            estimate.errors.push(format!("line {row}: quantity must be positive"));
            continue;
        }
        let Some(item) = product(line.product_id).filter(|p| p.is_active()) else {
            estimate
                .errors
                .push(format!("line {row}: product {} not found or inactive", line.product_id));
            continue;
        };
        if item.kind() != ItemKind::Product {
            estimate
                .errors
                .push(format!("line {row}: {} is not a finished product", item.label()));
            continue;
        }

        let unit_weight = item.unit_weight().unwrap_or(Decimal::ZERO);
        let weight = unit_weight * line.quantity;

        match estimate.products.iter_mut().find(|p| p.product_id == line.product_id) {
            Some(entry) => {
                entry.total_quantity += line.quantity;
                entry.total_weight += weight;
            }
            None => estimate.products.push(ProductWeight {
                product_id: line.product_id,
                code: item.code().to_string(),
                name: item.name().to_string(),
                unit_weight,
                total_quantity: line.quantity,
                total_weight: weight,
            }),
        }
        estimate.total_weight += weight;
    }

    estimate
}
