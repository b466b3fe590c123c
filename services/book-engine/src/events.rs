//! Fill and trade notifications
//!
//! Emitted as a trade print is applied against the book. Fills are
//! reported buy side before sell side, full fills before the (at most
//! one) partial within a side.

use serde::{Deserialize, Serialize};
use types::ids::{OrderId, ProductId};
use types::numeric::{Price, Quantity};

/// Per-order outcome of an applied trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillEvent {
    /// Order fully consumed and removed from the book
    Filled { order_id: OrderId },
    /// Order reduced to `remaining_quantity`
    PartiallyFilled {
        order_id: OrderId,
        remaining_quantity: Quantity,
    },
}

/// Outcome of one applied trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReport {
    pub product_id: ProductId,
    pub price: Price,
    /// Cumulative traded quantity at this price; resets when the
    /// traded price changes
    pub cumulative_quantity: Quantity,
    pub fills: Vec<FillEvent>,
}

impl TradeReport {
    /// Ids of orders fully consumed by this trade
    pub fn filled_order_ids(&self) -> impl Iterator<Item = OrderId> + '_ {
        self.fills.iter().filter_map(|fill| match fill {
            FillEvent::Filled { order_id } => Some(*order_id),
            FillEvent::PartiallyFilled { .. } => None,
        })
    }
}
