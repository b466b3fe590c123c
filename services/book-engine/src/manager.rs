//! Order book manager
//!
//! Routes parsed commands to per-product books, owns the order-id
//! routing map (MODIFY and REMOVE lines carry no product id), records
//! every failure in the exception log, and prints the book and
//! exception dumps. Errors never abort processing.

use std::collections::{BTreeMap, HashMap};

use types::errors::{EngineError, OrderError, TradeError};
use types::ids::{OrderId, ProductId};
use types::numeric::Price;
use types::order::{Order, Side};

use crate::command::Command;
use crate::engine::OrderBook;
use crate::events::{FillEvent, TradeReport};

/// Depth printed per side in the book dump
const DUMP_DEPTH: usize = 5;

/// One recorded failure, attributed to an order when one is known
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRecord {
    pub message: String,
    pub order_id: Option<OrderId>,
}

/// Multi-instrument command router and exception log
#[derive(Debug, Default)]
pub struct OrderBookManager {
    /// Books keyed by product; ordered so dumps are deterministic
    books: BTreeMap<ProductId, OrderBook>,
    /// Which book currently holds each resting order
    routes: HashMap<OrderId, ProductId>,
    exceptions: Vec<ExceptionRecord>,
}

impl OrderBookManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and apply one command line
    ///
    /// Failures are folded into the exception log; this never raises.
    pub fn apply_line(&mut self, line: &str) {
        match Command::parse(line) {
            Ok(command) => {
                let order_id = command.order_id();
                if let Err(err) = self.apply(command) {
                    self.record(err.to_string(), order_id);
                }
            }
            Err(err) => self.record(err.to_string(), None),
        }
    }

    /// Dispatch a parsed command to the owning book
    pub fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::New {
                product_id,
                order_id,
                side,
                quantity,
                price,
            } => {
                // order ids are unique across all instruments
                if self.routes.contains_key(&order_id) {
                    return Err(OrderError::Duplicate { order_id }.into());
                }

                let book = self
                    .books
                    .entry(product_id)
                    .or_insert_with(|| OrderBook::new(product_id));
                book.enter_order(Order::new(order_id, side, price, quantity))?;
                self.routes.insert(order_id, product_id);

                tracing::debug!(%order_id, %product_id, "order entered");
                Ok(())
            }
            Command::Modify {
                order_id,
                side,
                quantity,
                price,
            } => {
                let book = self.route(&order_id)?;
                verify_details(book, order_id, side, price)?;
                book.modify_order(order_id, quantity)?;

                tracing::debug!(%order_id, %quantity, "order modified");
                Ok(())
            }
            Command::Remove {
                order_id,
                side,
                quantity: _,
                price,
            } => {
                let book = self.route(&order_id)?;
                verify_details(book, order_id, side, price)?;
                book.delete_order(order_id)?;
                self.routes.remove(&order_id);

                tracing::debug!(%order_id, "order removed");
                Ok(())
            }
            Command::Trade {
                product_id,
                quantity,
                price,
            } => {
                let book = self
                    .books
                    .get_mut(&product_id)
                    .ok_or(TradeError::UnknownProduct { product_id })?;
                let report = book.apply_trade(price, quantity)?;

                // fully filled orders have left their book
                for order_id in report.filled_order_ids() {
                    self.routes.remove(&order_id);
                }

                print_trade(&report);
                Ok(())
            }
        }
    }

    /// Look up the book currently holding an order
    fn route(&mut self, order_id: &OrderId) -> Result<&mut OrderBook, EngineError> {
        let product_id = self
            .routes
            .get(order_id)
            .copied()
            .ok_or(OrderError::NotFound {
                order_id: *order_id,
            })?;
        self.books
            .get_mut(&product_id)
            .ok_or_else(|| EngineError::InvariantViolation {
                reason: format!("route for order {order_id} points at missing product {product_id}"),
            })
    }

    /// The book for a product, if one exists
    pub fn book(&self, product_id: &ProductId) -> Option<&OrderBook> {
        self.books.get(product_id)
    }

    /// Accumulated exception records, in submission order
    pub fn exceptions(&self) -> &[ExceptionRecord] {
        &self.exceptions
    }

    /// Print every book's top levels and last-trade state
    pub fn print_books(&self) {
        for (product_id, book) in &self.books {
            println!("ProductId [{product_id}]");

            println!("Bid levels (top {DUMP_DEPTH})");
            for (price, quantity) in book.bid_depth(DUMP_DEPTH) {
                println!("{price} : {quantity}");
            }

            println!("Ask levels (top {DUMP_DEPTH})");
            for (price, quantity) in book.ask_depth(DUMP_DEPTH) {
                println!("{price} : {quantity}");
            }

            match book.last_trade() {
                Some(last) => println!(
                    "Last Traded Price [{}] Last Traded Quantity [{}]",
                    last.price, last.quantity
                ),
                None => println!("Last Traded Price [0] Last Traded Quantity [0]"),
            }
        }
    }

    /// Print accumulated exceptions in submission order
    pub fn print_exceptions(&self) {
        for record in &self.exceptions {
            match record.order_id {
                Some(order_id) => println!("OrderId [{order_id}] msg [{}]", record.message),
                None => println!("Msg parsing failed with error [{}]", record.message),
            }
        }
    }

    fn record(&mut self, message: String, order_id: Option<OrderId>) {
        tracing::warn!(?order_id, %message, "command failed");
        self.exceptions.push(ExceptionRecord { message, order_id });
    }
}

/// Check that a MODIFY/REMOVE line's side and price match the resting order
///
/// The caller has already routed the id, so an order missing from its
/// book here is a book inconsistency, not an unknown id.
fn verify_details(
    book: &OrderBook,
    order_id: OrderId,
    side: Side,
    price: Price,
) -> Result<(), EngineError> {
    let order = book
        .order(&order_id)
        .ok_or_else(|| EngineError::InvariantViolation {
            reason: format!("order {order_id} is routed to this book but not resting in it"),
        })?;
    if order.side != side || order.price != price {
        return Err(OrderError::DetailsMismatch { order_id }.into());
    }
    Ok(())
}

/// Print the fill notifications and trade line for one applied trade
fn print_trade(report: &TradeReport) {
    for fill in &report.fills {
        match fill {
            FillEvent::Filled { order_id } => {
                println!("Order id [{order_id}] fully filled");
            }
            FillEvent::PartiallyFilled {
                order_id,
                remaining_quantity,
            } => {
                println!("Order id [{order_id}] partially filled, new qty [{remaining_quantity}]");
            }
        }
    }
    println!(
        "Trade received for productId [{}] Total Traded Quantity [{}] Traded Price [{}]",
        report.product_id, report.cumulative_quantity, report.price
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::Quantity;

    fn oid(value: u64) -> OrderId {
        OrderId::try_new(value).unwrap()
    }

    fn pid(value: u64) -> ProductId {
        ProductId::try_new(value).unwrap()
    }

    fn qty(value: u64) -> Quantity {
        Quantity::try_new(value).unwrap()
    }

    fn price(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    #[test]
    fn test_new_creates_book_on_first_order() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");

        let book = manager.book(&pid(1)).unwrap();
        assert_eq!(book.bid_depth(5), vec![(price("9.50"), qty(100))]);
        assert!(manager.exceptions().is_empty());
    }

    #[test]
    fn test_modify_routes_without_product_id() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("M,10,B,80,9.50");

        let book = manager.book(&pid(1)).unwrap();
        assert_eq!(book.order(&oid(10)).unwrap().quantity, qty(80));
        assert!(manager.exceptions().is_empty());
    }

    #[test]
    fn test_remove_clears_route() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("R,10,B,100,9.50");

        assert!(manager.book(&pid(1)).unwrap().order(&oid(10)).is_none());

        // the id is free for reuse once removed
        manager.apply_line("N,2,10,S,50,10.50");
        assert!(manager.exceptions().is_empty());
        assert_eq!(
            manager.book(&pid(2)).unwrap().ask_depth(5),
            vec![(price("10.50"), qty(50))]
        );
    }

    #[test]
    fn test_duplicate_order_id_across_products_rejected() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("N,2,10,B,100,9.50");

        let exceptions = manager.exceptions();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].order_id, Some(oid(10)));
        assert!(exceptions[0].message.contains("already exists"));
        // second product's book never materializes an order
        assert!(manager.book(&pid(2)).is_none());
    }

    #[test]
    fn test_modify_unknown_order_logged() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("M,99,B,80,9.50");

        let exceptions = manager.exceptions();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].order_id, Some(oid(99)));
        assert!(exceptions[0].message.contains("not found"));
    }

    #[test]
    fn test_modify_details_mismatch_rejected() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("M,10,S,80,9.50");
        manager.apply_line("M,10,B,80,9.75");

        assert_eq!(manager.exceptions().len(), 2);
        // quantity unchanged by either attempt
        let book = manager.book(&pid(1)).unwrap();
        assert_eq!(book.order(&oid(10)).unwrap().quantity, qty(100));
    }

    #[test]
    fn test_parse_failure_logged_without_order_id() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("Q,1,2,3");
        manager.apply_line("");

        let exceptions = manager.exceptions();
        assert_eq!(exceptions.len(), 2);
        assert_eq!(exceptions[0].order_id, None);
        assert_eq!(exceptions[1].order_id, None);
    }

    #[test]
    fn test_trade_unknown_product_logged() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("X,7,100,9.50");

        let exceptions = manager.exceptions();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].order_id, None);
        assert!(exceptions[0].message.contains("product 7"));
    }

    #[test]
    fn test_trade_prunes_routes_of_filled_orders() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("N,1,20,S,100,9.50");
        manager.apply_line("X,1,100,9.50");

        assert!(manager.exceptions().is_empty());
        assert_eq!(manager.book(&pid(1)).unwrap().order_count(), 0);

        // both ids are free again
        manager.apply_line("N,1,10,B,10,9.00");
        manager.apply_line("N,1,20,S,10,10.00");
        assert!(manager.exceptions().is_empty());
    }

    #[test]
    fn test_errors_do_not_stop_processing() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("N,1,10,B,100,9.50"); // duplicate
        manager.apply_line("N,1,11,S,100,10.50"); // still applied

        assert_eq!(manager.exceptions().len(), 1);
        let book = manager.book(&pid(1)).unwrap();
        assert_eq!(book.ask_depth(5), vec![(price("10.50"), qty(100))]);
    }

    #[test]
    fn test_independent_products() {
        let mut manager = OrderBookManager::new();

        manager.apply_line("N,1,10,B,100,9.50");
        manager.apply_line("N,2,20,B,70,101.00");

        assert_eq!(
            manager.book(&pid(1)).unwrap().bid_depth(5),
            vec![(price("9.50"), qty(100))]
        );
        assert_eq!(
            manager.book(&pid(2)).unwrap().bid_depth(5),
            vec![(price("101.00"), qty(70))]
        );
    }
}
