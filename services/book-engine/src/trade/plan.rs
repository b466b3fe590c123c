//! Fill-plan construction
//!
//! A trade print consumes the same quantity from both sides of the
//! book. Each side's plan is computed against an immutable view of its
//! levels and committed only once both sides are known to be
//! satisfiable, so a failed trade never leaves the book half mutated.

use types::errors::TradeError;
use types::ids::OrderId;
use types::numeric::{Price, Quantity};
use types::order::Side;

use crate::book::PriceLevel;

/// A single planned fill
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// Order fully consumed; it leaves the book
    Full { order_id: OrderId },
    /// Order reduced to `new_quantity`
    Partial {
        order_id: OrderId,
        new_quantity: Quantity,
    },
}

/// Complete fill plan for one side of a trade
#[derive(Debug, Clone, PartialEq)]
pub struct FillPlan {
    side: Side,
    fills: Vec<Fill>,
}

/// Whether a level at `level_price` may supply liquidity for a trade
/// at `trade_price` on the given side
fn level_in_band(side: Side, level_price: Price, trade_price: Price) -> bool {
    match side {
        Side::Buy => level_price >= trade_price,
        Side::Sell => level_price <= trade_price,
    }
}

impl FillPlan {
    /// Walk one side's levels best-first and plan fills for `quantity`
    ///
    /// Levels are consumed in price priority; orders within a level in
    /// arrival order. An order whose quantity equals the residual is a
    /// full fill, so at most one order per side (the earliest at the
    /// terminal level) is left partial.
    pub fn build<'a>(
        levels: impl Iterator<Item = (Price, &'a PriceLevel)>,
        side: Side,
        trade_price: Price,
        quantity: Quantity,
    ) -> Result<Self, TradeError> {
        let mut fills = Vec::new();
        let mut remaining = quantity.get();

        for (level_price, level) in levels {
            if !level_in_band(side, level_price, trade_price) {
                break;
            }

            let level_total = level.total_quantity().get();
            if level_total == remaining {
                // whole level consumed exactly
                fills.extend(level.entries().map(|(order_id, _)| Fill::Full { order_id }));
                remaining = 0;
                break;
            } else if level_total > remaining {
                for (order_id, order_quantity) in level.entries() {
                    let order_quantity = order_quantity.get();
                    if order_quantity == remaining {
                        fills.push(Fill::Full { order_id });
                        remaining = 0;
                        break;
                    } else if order_quantity > remaining {
                        // earliest arrival absorbs the partial
                        let new_quantity = Quantity::try_new(order_quantity - remaining)
                            .unwrap_or(Quantity::zero());
                        fills.push(Fill::Partial {
                            order_id,
                            new_quantity,
                        });
                        remaining = 0;
                        break;
                    } else {
                        fills.push(Fill::Full { order_id });
                        remaining -= order_quantity;
                    }
                }
                break;
            } else {
                // level smaller than the residual: consume it whole
                fills.extend(level.entries().map(|(order_id, _)| Fill::Full { order_id }));
                remaining -= level_total;
            }
        }

        if remaining > 0 {
            return Err(TradeError::InsufficientLiquidity { side });
        }

        Ok(Self { side, fills })
    }

    /// Which side this plan consumes
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of planned fills
    pub fn len(&self) -> usize {
        self.fills.len()
    }

    /// Check if the plan contains no fills
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }

    /// Consume the plan, yielding fills in application order
    pub fn into_fills(self) -> Vec<Fill> {
        self.fills
    }
}
