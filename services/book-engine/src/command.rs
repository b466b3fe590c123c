//! Textual command protocol
//!
//! One command per line. Tokens are separated by any of comma,
//! semicolon, colon, or space; empty tokens are discarded. Fields are
//! positional:
//!
//! | Action | Char | Fields                                     |
//! |--------|------|--------------------------------------------|
//! | NEW    | `N`  | productId, orderId, side, quantity, price  |
//! | MODIFY | `M`  | orderId, side, quantity, price             |
//! | REMOVE | `R`  | orderId, side, quantity, price             |
//! | TRADE  | `X`  | productId, quantity, price                 |

use thiserror::Error;
use types::ids::{OrderId, ProductId};
use types::numeric::{Price, Quantity};
use types::order::Side;

/// Separator set of the wire format
const SEPARATORS: &[char] = &[',', ';', ':', ' '];

/// A parsed command line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    New {
        product_id: ProductId,
        order_id: OrderId,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    Modify {
        order_id: OrderId,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    Remove {
        order_id: OrderId,
        side: Side,
        quantity: Quantity,
        price: Price,
    },
    Trade {
        product_id: ProductId,
        quantity: Quantity,
        price: Price,
    },
}

/// Command parse failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty command line")]
    Empty,

    #[error("Unknown action [{0}]")]
    UnknownAction(String),

    #[error("Invalid arguments for {action}: expected {expected} fields, got {got}")]
    WrongFieldCount {
        action: char,
        expected: usize,
        got: usize,
    },

    #[error("Received invalid productId [{0}]")]
    InvalidProductId(String),

    #[error("Received invalid orderId [{0}]")]
    InvalidOrderId(String),

    #[error("Invalid side received [{0}]")]
    InvalidSide(String),

    #[error("Invalid quantity received [{0}]")]
    InvalidQuantity(String),

    #[error("Invalid price received [{0}]")]
    InvalidPrice(String),
}

/// Split a line on the separator set, discarding empty tokens
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split(SEPARATORS).filter(|token| !token.is_empty()).collect()
}

impl Command {
    /// Parse one command line
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(line);
        let action = *tokens.first().ok_or(ParseError::Empty)?;

        match action {
            "N" => {
                expect_fields('N', &tokens, 6)?;
                Ok(Command::New {
                    product_id: parse_product_id(tokens[1])?,
                    order_id: parse_order_id(tokens[2])?,
                    side: parse_side(tokens[3])?,
                    quantity: parse_quantity(tokens[4])?,
                    price: parse_price(tokens[5])?,
                })
            }
            "M" | "R" => {
                let action_char = if action == "M" { 'M' } else { 'R' };
                expect_fields(action_char, &tokens, 5)?;
                let order_id = parse_order_id(tokens[1])?;
                let side = parse_side(tokens[2])?;
                let quantity = parse_quantity(tokens[3])?;
                let price = parse_price(tokens[4])?;

                if action == "M" {
                    Ok(Command::Modify {
                        order_id,
                        side,
                        quantity,
                        price,
                    })
                } else {
                    Ok(Command::Remove {
                        order_id,
                        side,
                        quantity,
                        price,
                    })
                }
            }
            "X" => {
                expect_fields('X', &tokens, 4)?;
                Ok(Command::Trade {
                    product_id: parse_product_id(tokens[1])?,
                    quantity: parse_quantity(tokens[2])?,
                    price: parse_price(tokens[3])?,
                })
            }
            other => Err(ParseError::UnknownAction(other.to_string())),
        }
    }

    /// Order id carried by the command, for exception attribution
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Command::New { order_id, .. }
            | Command::Modify { order_id, .. }
            | Command::Remove { order_id, .. } => Some(*order_id),
            Command::Trade { .. } => None,
        }
    }
}

fn expect_fields(action: char, tokens: &[&str], expected: usize) -> Result<(), ParseError> {
    if tokens.len() != expected {
        return Err(ParseError::WrongFieldCount {
            action,
            expected,
            got: tokens.len(),
        });
    }
    Ok(())
}

fn parse_product_id(token: &str) -> Result<ProductId, ParseError> {
    token
        .parse::<u64>()
        .ok()
        .and_then(ProductId::try_new)
        .ok_or_else(|| ParseError::InvalidProductId(token.to_string()))
}

fn parse_order_id(token: &str) -> Result<OrderId, ParseError> {
    token
        .parse::<u64>()
        .ok()
        .and_then(OrderId::try_new)
        .ok_or_else(|| ParseError::InvalidOrderId(token.to_string()))
}

fn parse_side(token: &str) -> Result<Side, ParseError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Side::from_char(c).ok_or_else(|| ParseError::InvalidSide(token.to_string())),
        _ => Err(ParseError::InvalidSide(token.to_string())),
    }
}

fn parse_quantity(token: &str) -> Result<Quantity, ParseError> {
    Quantity::parse(token).ok_or_else(|| ParseError::InvalidQuantity(token.to_string()))
}

fn parse_price(token: &str) -> Result<Price, ParseError> {
    Price::parse(token).ok_or_else(|| ParseError::InvalidPrice(token.to_string()))
}
