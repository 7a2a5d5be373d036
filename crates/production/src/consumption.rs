use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use millerp_core::{Entity, Quantity};
use millerp_inventory::{BatchId, MovementId, StockItemId};

use crate::order::ProductionOrderId;

millerp_core::typed_id!(
    /// Material consumption audit row identifier.
    ConsumptionId
);

/// Audit row: how much of which batch a production order consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionMaterial {
    pub id: ConsumptionId,
    pub order_id: ProductionOrderId,
    pub material_id: StockItemId,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity_used: Quantity,
    /// The `out` movement that drew the material.
    pub movement_id: MovementId,
    pub created_at: DateTime<Utc>,
}

impl Entity for ProductionMaterial {
    type Id = ConsumptionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
