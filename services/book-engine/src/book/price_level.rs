//! Price level implementation with FIFO queue
//!
//! A price level aggregates all resting orders at one price on one
//! side of the book. Orders are maintained in strict arrival order so
//! that trade application consumes the earliest order first.

use std::collections::VecDeque;
use types::ids::OrderId;
use types::numeric::Quantity;

/// A price level containing orders at a specific price
///
/// Maintains strict FIFO ordering. Entries hold the order id and its
/// current resting quantity; the order itself lives in the owning
/// book's id index.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// Queue of orders at this price level (FIFO order)
    orders: VecDeque<LevelEntry>,
    /// Total quantity resting at this level
    total_quantity: Quantity,
}

/// Entry in the price level queue
#[derive(Debug, Clone)]
struct LevelEntry {
    order_id: OrderId,
    quantity: Quantity,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_quantity: Quantity::zero(),
        }
    }

    /// Append an order at the back of the queue (arrival priority)
    pub fn insert(&mut self, order_id: OrderId, quantity: Quantity) {
        self.orders.push_back(LevelEntry { order_id, quantity });
        self.total_quantity = self.total_quantity + quantity;
    }

    /// Remove an order from the queue by OrderId
    ///
    /// Returns the removed order's resting quantity, or None if not found
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self.orders.iter().position(|entry| &entry.order_id == order_id)?;
        let entry = self.orders.remove(position)?;

        self.total_quantity = self.total_quantity - entry.quantity;

        Some(entry.quantity)
    }

    /// Replace the resting quantity of an order already on the level
    ///
    /// Arrival position is unchanged. Returns false if the order is not
    /// on this level.
    pub fn set_quantity(&mut self, order_id: &OrderId, new_quantity: Quantity) -> bool {
        if let Some(entry) = self.orders.iter_mut().find(|entry| &entry.order_id == order_id) {
            self.total_quantity = self.total_quantity - entry.quantity + new_quantity;
            entry.quantity = new_quantity;
            true
        } else {
            false
        }
    }

    /// Iterate entries front (earliest arrival) to back
    pub fn entries(&self) -> impl Iterator<Item = (OrderId, Quantity)> + '_ {
        self.orders.iter().map(|entry| (entry.order_id, entry.quantity))
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Get the total quantity at this price level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    /// Get the number of orders at this level
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}
