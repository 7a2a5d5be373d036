//! Stock statistics derived from the ledger.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::item::StockItemId;
use crate::movement::{Direction, StockMovement};

/// Opening/incoming/outgoing/closing figures for one item on one day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStockStatistics {
    pub item_id: StockItemId,
    pub date: NaiveDate,
    pub opening: Decimal,
    pub incoming: Decimal,
    pub outgoing: Decimal,
    pub closing: Decimal,
}

pub fn daily_statistics<'a>(
    item_id: StockItemId,
    date: NaiveDate,
    movements: impl IntoIterator<Item = &'a StockMovement>,
) -> DailyStockStatistics {
    let mut stats = DailyStockStatistics {
        item_id,
        date,
        opening: Decimal::ZERO,
        incoming: Decimal::ZERO,
        outgoing: Decimal::ZERO,
        closing: Decimal::ZERO,
    };

    for movement in movements.into_iter().filter(|m| m.item_id() == item_id) {
        let day = movement.created_at().date_naive();
        if day < date {
            stats.opening += movement.stock_effect();
        } else if day == date {
            match movement.direction() {
                Direction::In => stats.incoming += movement.quantity().value(),
                Direction::Out => stats.outgoing += movement.quantity().value(),
                Direction::Adjust => {}
            }
        }
    }

    stats.closing = stats.opening + stats.incoming - stats.outgoing;
    stats
}
