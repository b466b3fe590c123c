//! Order book core
//!
//! One instrument's book: both side books, the order id index, and
//! last-trade state. Trade application walks both sides in price
//! priority and commits fills through the book's own modify and delete
//! operations so every invariant is re-established naturally.

use std::collections::HashMap;

use types::errors::{EngineError, OrderError, TradeError};
use types::ids::{OrderId, ProductId};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};

use crate::book::{AskBook, BidBook};
use crate::events::{FillEvent, TradeReport};
use crate::trade::{Fill, FillPlan};

/// Most recent trade state for one instrument
///
/// `quantity` accumulates across consecutive trades at the same price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastTrade {
    pub price: Price,
    pub quantity: Quantity,
}

/// Order book for a single instrument
#[derive(Debug)]
pub struct OrderBook {
    product_id: ProductId,
    bids: BidBook,
    asks: AskBook,
    /// Single owner of every resting order; side books hold ids only
    orders: HashMap<OrderId, Order>,
    last_trade: Option<LastTrade>,
}

impl OrderBook {
    /// Create an empty book for a product
    pub fn new(product_id: ProductId) -> Self {
        Self {
            product_id,
            bids: BidBook::new(),
            asks: AskBook::new(),
            orders: HashMap::new(),
            last_trade: None,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Enter a new resting order
    pub fn enter_order(&mut self, order: Order) -> Result<(), EngineError> {
        if self.orders.contains_key(&order.order_id) {
            return Err(OrderError::Duplicate {
                order_id: order.order_id,
            }
            .into());
        }

        match order.side {
            Side::Buy => self.bids.insert(&order),
            Side::Sell => self.asks.insert(&order),
        }
        self.orders.insert(order.order_id, order);

        Ok(())
    }

    /// Look up a resting order
    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Replace an order's quantity; price and side are immutable
    ///
    /// Returns whether the book changed: modifying to the current
    /// quantity is a no-op.
    pub fn modify_order(
        &mut self,
        order_id: OrderId,
        new_quantity: Quantity,
    ) -> Result<bool, EngineError> {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(OrderError::NotFound { order_id })?;

        if order.quantity == new_quantity {
            return Ok(false);
        }

        let (side, price) = (order.side, order.price);
        order.quantity = new_quantity;

        let updated = match side {
            Side::Buy => self.bids.set_order_quantity(&order_id, price, new_quantity),
            Side::Sell => self.asks.set_order_quantity(&order_id, price, new_quantity),
        };
        if !updated {
            return Err(EngineError::InvariantViolation {
                reason: format!("order {order_id} missing from its price level"),
            });
        }

        Ok(true)
    }

    /// Remove a resting order entirely
    pub fn delete_order(&mut self, order_id: OrderId) -> Result<Order, EngineError> {
        let order = self
            .orders
            .remove(&order_id)
            .ok_or(OrderError::NotFound { order_id })?;

        let removed = match order.side {
            Side::Buy => self.bids.remove(&order_id, order.price),
            Side::Sell => self.asks.remove(&order_id, order.price),
        };
        if !removed {
            return Err(EngineError::InvariantViolation {
                reason: format!("order {order_id} missing from its price level"),
            });
        }

        Ok(order)
    }

    /// Apply an external trade print against both sides of the book
    ///
    /// Consumes `quantity` at or better than `price` from each side in
    /// price priority, FIFO within a level. Both fill plans are
    /// computed before any mutation, so a rejected trade leaves the
    /// book untouched.
    pub fn apply_trade(
        &mut self,
        price: Price,
        quantity: Quantity,
    ) -> Result<TradeReport, EngineError> {
        let (best_bid, best_ask) = match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => return Err(TradeError::EmptyBook.into()),
        };

        // trade price must lie inside the inclusive top-of-book band
        if best_bid < price || best_ask > price {
            return Err(TradeError::OutOfBand { price }.into());
        }

        let bid_plan = FillPlan::build(self.bids.levels(), Side::Buy, price, quantity)?;
        let ask_plan = FillPlan::build(self.asks.levels(), Side::Sell, price, quantity)?;

        let mut fills = Vec::with_capacity(bid_plan.len() + ask_plan.len());
        self.commit_plan(bid_plan, &mut fills)?;
        self.commit_plan(ask_plan, &mut fills)?;

        let cumulative = match self.last_trade {
            Some(last) if last.price == price => last.quantity + quantity,
            _ => quantity,
        };
        self.last_trade = Some(LastTrade {
            price,
            quantity: cumulative,
        });

        tracing::debug!(product_id = %self.product_id, %price, %quantity, "trade applied");

        Ok(TradeReport {
            product_id: self.product_id,
            price,
            cumulative_quantity: cumulative,
            fills,
        })
    }

    /// Apply a validated fill plan through the book's own operations
    fn commit_plan(
        &mut self,
        plan: FillPlan,
        fills: &mut Vec<FillEvent>,
    ) -> Result<(), EngineError> {
        for fill in plan.into_fills() {
            match fill {
                Fill::Full { order_id } => {
                    self.delete_order(order_id).map_err(|err| {
                        EngineError::InvariantViolation {
                            reason: format!("planned full fill of order {order_id} failed: {err}"),
                        }
                    })?;
                    fills.push(FillEvent::Filled { order_id });
                }
                Fill::Partial {
                    order_id,
                    new_quantity,
                } => {
                    self.modify_order(order_id, new_quantity).map_err(|err| {
                        EngineError::InvariantViolation {
                            reason: format!(
                                "planned partial fill of order {order_id} failed: {err}"
                            ),
                        }
                    })?;
                    fills.push(FillEvent::PartiallyFilled {
                        order_id,
                        remaining_quantity: new_quantity,
                    });
                }
            }
        }
        Ok(())
    }

    /// Top N bid levels, highest price first
    pub fn bid_depth(&self, depth: usize) -> Vec<(Price, Quantity)> {
        self.bids.depth_snapshot(depth)
    }

    /// Top N ask levels, lowest price first
    pub fn ask_depth(&self, depth: usize) -> Vec<(Price, Quantity)> {
        self.asks.depth_snapshot(depth)
    }

    /// Last-trade state; None before the first successful trade
    pub fn last_trade(&self) -> Option<LastTrade> {
        self.last_trade
    }

    /// Number of resting orders across both sides
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(value: u64) -> OrderId {
        OrderId::try_new(value).unwrap()
    }

    fn qty(value: u64) -> Quantity {
        Quantity::try_new(value).unwrap()
    }

    fn price(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    fn book() -> OrderBook {
        OrderBook::new(ProductId::try_new(1).unwrap())
    }

    fn enter(book: &mut OrderBook, id: u64, side: Side, p: &str, q: u64) {
        book.enter_order(Order::new(oid(id), side, price(p), qty(q)))
            .unwrap();
    }

    #[test]
    fn test_enter_order_builds_book() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);
        enter(&mut book, 11, Side::Sell, "10.50", 100);

        assert_eq!(book.bid_depth(5), vec![(price("9.50"), qty(100))]);
        assert_eq!(book.ask_depth(5), vec![(price("10.50"), qty(100))]);
        assert_eq!(book.order_count(), 2);
    }

    #[test]
    fn test_enter_duplicate_id_rejected() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);

        let err = book
            .enter_order(Order::new(oid(10), Side::Sell, price("10.50"), qty(5)))
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::Order(OrderError::Duplicate { order_id: oid(10) })
        );
        // book unchanged
        assert!(book.ask_depth(5).is_empty());
        assert_eq!(book.order_count(), 1);
    }

    #[test]
    fn test_modify_order_updates_level_total() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);
        enter(&mut book, 11, Side::Buy, "9.50", 50);

        let changed = book.modify_order(oid(11), qty(80)).unwrap();

        assert!(changed);
        assert_eq!(book.bid_depth(5), vec![(price("9.50"), qty(180))]);
        assert_eq!(book.order(&oid(11)).unwrap().quantity, qty(80));
    }

    #[test]
    fn test_modify_to_same_quantity_is_noop() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);

        assert!(!book.modify_order(oid(10), qty(100)).unwrap());
        assert_eq!(book.bid_depth(5), vec![(price("9.50"), qty(100))]);
    }

    #[test]
    fn test_modify_unknown_order() {
        let mut book = book();

        let err = book.modify_order(oid(99), qty(10)).unwrap_err();
        assert_eq!(
            err,
            EngineError::Order(OrderError::NotFound { order_id: oid(99) })
        );
    }

    #[test]
    fn test_delete_order_round_trip() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);
        enter(&mut book, 11, Side::Sell, "10.50", 100);

        let removed = book.delete_order(oid(10)).unwrap();

        assert_eq!(removed.order_id, oid(10));
        assert!(book.bid_depth(5).is_empty());
        assert!(book.order(&oid(10)).is_none());
        // the other side is untouched
        assert_eq!(book.ask_depth(5), vec![(price("10.50"), qty(100))]);
    }

    #[test]
    fn test_delete_unknown_order() {
        let mut book = book();

        let err = book.delete_order(oid(99)).unwrap_err();
        assert_eq!(
            err,
            EngineError::Order(OrderError::NotFound { order_id: oid(99) })
        );
    }

    #[test]
    fn test_trade_fifo_partial_within_level() {
        // level 9.50 has [10:100, 11:50]; a 120 trade fills 10 fully
        // and leaves 11 resting 30
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);
        enter(&mut book, 11, Side::Buy, "9.50", 50);
        enter(&mut book, 20, Side::Sell, "9.50", 150);

        let report = book.apply_trade(price("9.50"), qty(120)).unwrap();

        assert_eq!(
            report.fills,
            vec![
                FillEvent::Filled { order_id: oid(10) },
                FillEvent::PartiallyFilled {
                    order_id: oid(11),
                    remaining_quantity: qty(30)
                },
                FillEvent::PartiallyFilled {
                    order_id: oid(20),
                    remaining_quantity: qty(30)
                },
            ]
        );
        assert_eq!(book.bid_depth(5), vec![(price("9.50"), qty(30))]);
        assert_eq!(book.ask_depth(5), vec![(price("9.50"), qty(30))]);
        assert!(book.order(&oid(10)).is_none());
    }

    #[test]
    fn test_trade_walks_ask_levels() {
        // asks 40@10.00 + 60@10.25, bid 100@10.25; trade 90@10.25
        let mut book = book();
        enter(&mut book, 20, Side::Sell, "10.00", 40);
        enter(&mut book, 21, Side::Sell, "10.25", 60);
        enter(&mut book, 30, Side::Buy, "10.25", 100);

        let report = book.apply_trade(price("10.25"), qty(90)).unwrap();

        assert_eq!(
            report.fills,
            vec![
                FillEvent::PartiallyFilled {
                    order_id: oid(30),
                    remaining_quantity: qty(10)
                },
                FillEvent::Filled { order_id: oid(20) },
                FillEvent::PartiallyFilled {
                    order_id: oid(21),
                    remaining_quantity: qty(10)
                },
            ]
        );
        assert_eq!(book.bid_depth(5), vec![(price("10.25"), qty(10))]);
        assert_eq!(book.ask_depth(5), vec![(price("10.25"), qty(10))]);
    }

    #[test]
    fn test_trade_exact_level_total_prunes_level() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);
        enter(&mut book, 11, Side::Buy, "9.50", 50);
        enter(&mut book, 20, Side::Sell, "9.50", 150);

        let report = book.apply_trade(price("9.50"), qty(150)).unwrap();

        assert_eq!(report.fills.len(), 3);
        assert!(book.bid_depth(5).is_empty());
        assert!(book.ask_depth(5).is_empty());
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn test_trade_on_empty_book_rejected() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);

        let err = book.apply_trade(price("9.50"), qty(10)).unwrap_err();
        assert_eq!(err, EngineError::Trade(TradeError::EmptyBook));
    }

    #[test]
    fn test_trade_out_of_band_rejected() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "9.50", 100);
        enter(&mut book, 11, Side::Sell, "10.50", 100);

        let err = book.apply_trade(price("11.00"), qty(10)).unwrap_err();

        assert_eq!(
            err,
            EngineError::Trade(TradeError::OutOfBand {
                price: price("11.00")
            })
        );
        // book unchanged
        assert_eq!(book.bid_depth(5), vec![(price("9.50"), qty(100))]);
        assert_eq!(book.ask_depth(5), vec![(price("10.50"), qty(100))]);
    }

    #[test]
    fn test_trade_insufficient_liquidity_is_atomic() {
        // bids total 50, asks total 200: the ask side could fill but
        // the bid side cannot, and neither side may change
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "10.00", 50);
        enter(&mut book, 20, Side::Sell, "10.00", 200);

        let err = book.apply_trade(price("10.00"), qty(100)).unwrap_err();

        assert_eq!(
            err,
            EngineError::Trade(TradeError::InsufficientLiquidity { side: Side::Buy })
        );
        assert_eq!(book.bid_depth(5), vec![(price("10.00"), qty(50))]);
        assert_eq!(book.ask_depth(5), vec![(price("10.00"), qty(200))]);
        assert_eq!(book.order_count(), 2);
        assert!(book.last_trade().is_none());
    }

    #[test]
    fn test_trade_conservation() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "10.00", 70);
        enter(&mut book, 11, Side::Buy, "9.75", 80);
        enter(&mut book, 20, Side::Sell, "9.50", 60);
        enter(&mut book, 21, Side::Sell, "9.75", 90);

        let bids_before: u64 = book.bid_depth(10).iter().map(|(_, q)| q.get()).sum();
        let asks_before: u64 = book.ask_depth(10).iter().map(|(_, q)| q.get()).sum();

        book.apply_trade(price("9.75"), qty(100)).unwrap();

        let bids_after: u64 = book.bid_depth(10).iter().map(|(_, q)| q.get()).sum();
        let asks_after: u64 = book.ask_depth(10).iter().map(|(_, q)| q.get()).sum();

        assert_eq!(bids_before - bids_after, 100);
        assert_eq!(asks_before - asks_after, 100);
    }

    #[test]
    fn test_last_trade_coalesces_same_price() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "10.00", 500);
        enter(&mut book, 20, Side::Sell, "10.00", 500);

        book.apply_trade(price("10.00"), qty(30)).unwrap();
        let report = book.apply_trade(price("10.00"), qty(20)).unwrap();

        assert_eq!(report.cumulative_quantity, qty(50));
        let last = book.last_trade().unwrap();
        assert_eq!(last.price, price("10.00"));
        assert_eq!(last.quantity, qty(50));
    }

    #[test]
    fn test_last_trade_resets_on_new_price() {
        let mut book = book();
        enter(&mut book, 10, Side::Buy, "10.00", 500);
        enter(&mut book, 11, Side::Buy, "9.75", 500);
        enter(&mut book, 20, Side::Sell, "9.75", 500);
        enter(&mut book, 21, Side::Sell, "10.00", 500);

        book.apply_trade(price("10.00"), qty(30)).unwrap();
        book.apply_trade(price("9.75"), qty(20)).unwrap();

        let last = book.last_trade().unwrap();
        assert_eq!(last.price, price("9.75"));
        assert_eq!(last.quantity, qty(20));
    }
}
