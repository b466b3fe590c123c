//! Error taxonomy for the order book engine
//!
//! Core operations return these errors up to the manager boundary,
//! where they are folded into the exception log.

use crate::ids::{OrderId, ProductId};
use crate::numeric::Price;
use crate::order::Side;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),

    #[error("Book invariant violated: {reason}")]
    InvariantViolation { reason: String },
}

/// Errors raised by order entry, modification, and removal
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("Order with id {order_id} already exists")]
    Duplicate { order_id: OrderId },

    #[error("Order {order_id} not found")]
    NotFound { order_id: OrderId },

    #[error("Side or price does not match resting order {order_id}")]
    DetailsMismatch { order_id: OrderId },
}

/// Errors raised while applying a trade print
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("Trade received on an empty order book")]
    EmptyBook,

    #[error("Trade price {price} outside the top of book")]
    OutOfBand { price: Price },

    #[error("Insufficient quantity to fill from {side:?} side of the book")]
    InsufficientLiquidity { side: Side },

    #[error("No order book exists for product {product_id}")]
    UnknownProduct { product_id: ProductId },
}
