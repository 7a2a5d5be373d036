use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::{DomainError, DomainResult, Entity, Quantity};

millerp_core::typed_id!(
    /// Stock item identifier (material or finished product).
    StockItemId
);

/// Which catalog a stocked item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Material,
    Product,
}

impl core::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemKind::Material => f.write_str("material"),
            ItemKind::Product => f.write_str("product"),
        }
    }
}

/// Min/warning/max levels used for stock alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StockThresholds {
    pub min: Decimal,
    pub warning: Decimal,
    pub max: Decimal,
}

/// Stock health derived from [`StockThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    /// At or below the minimum level.
    Danger,
    /// At or below the warning level.
    Warning,
    /// At or above the maximum level.
    Overstock,
    Normal,
}

/// Catalog entry for a material or product, with its denormalized stock counter.
///
/// `stock` only changes through the ledger (`crate::ledger::record_movement`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    id: StockItemId,
    kind: ItemKind,
    code: String,
    name: String,
    unit: String,
    stock: Decimal,
    thresholds: StockThresholds,
    /// Weight per unit in kg; products only.
    unit_weight: Option<Decimal>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

/// Input for registering a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockItem {
    pub kind: ItemKind,
    pub code: String,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub thresholds: StockThresholds,
    #[serde(default)]
    pub unit_weight: Option<Decimal>,
}

impl NewStockItem {
    pub fn material(code: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Material,
            code: code.into(),
            name: name.into(),
            unit: unit.into(),
            thresholds: StockThresholds::default(),
            unit_weight: None,
        }
    }

    pub fn product(code: impl Into<String>, name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Product,
            ..Self::material(code, name, unit)
        }
    }

    pub fn with_thresholds(mut self, thresholds: StockThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_unit_weight(mut self, unit_weight: Decimal) -> Self {
        self.unit_weight = Some(unit_weight);
        self
    }
}

impl StockItem {
    /// Validate and build a catalog item with zero stock.
    pub fn create(id: StockItemId, input: NewStockItem, at: DateTime<Utc>) -> DomainResult<Self> {
        if input.code.trim().is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if input.unit.trim().is_empty() {
            return Err(DomainError::validation("unit of measure cannot be empty"));
        }
        let t = input.thresholds;
        if t.min < Decimal::ZERO || t.warning < Decimal::ZERO || t.max < Decimal::ZERO {
            return Err(DomainError::validation("stock thresholds cannot be negative"));
        }
        if input.unit_weight.is_some_and(|w| w < Decimal::ZERO) {
            return Err(DomainError::validation("unit weight cannot be negative"));
        }

        Ok(Self {
            id,
            kind: input.kind,
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            unit: input.unit,
            stock: Decimal::ZERO,
            thresholds: t,
            unit_weight: input.unit_weight,
            is_active: true,
            created_at: at,
        })
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn stock(&self) -> Decimal {
        self.stock
    }

    pub fn thresholds(&self) -> StockThresholds {
        self.thresholds
    }

    pub fn unit_weight(&self) -> Option<Decimal> {
        self.unit_weight
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Human-readable label used in error messages: `"name (code)"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn stock_status(&self) -> StockStatus {
        let t = self.thresholds;
        if self.stock <= t.min {
            StockStatus::Danger
        } else if self.stock <= t.warning {
            StockStatus::Warning
        } else if t.max > Decimal::ZERO && self.stock >= t.max {
            StockStatus::Overstock
        } else {
            StockStatus::Normal
        }
    }

    pub fn should_alert(&self) -> bool {
        matches!(self.stock_status(), StockStatus::Danger | StockStatus::Warning)
    }

    /// Fail with `InsufficientStock` unless `quantity` can be issued.
    pub fn ensure_available(&self, quantity: Quantity) -> DomainResult<()> {
        if self.stock < quantity.value() {
            return Err(DomainError::InsufficientStock {
                item: self.label(),
                available: self.stock,
                requested: quantity.value(),
            });
        }
        Ok(())
    }

    pub(crate) fn increase(&mut self, quantity: Quantity) {
        self.stock += quantity.value();
    }

    pub(crate) fn decrease(&mut self, quantity: Quantity) -> DomainResult<()> {
        self.ensure_available(quantity)?;
        self.stock -= quantity.value();
        Ok(())
    }
}

impl Entity for StockItem {
    type Id = StockItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
