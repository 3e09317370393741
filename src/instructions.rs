//! Instruction-file reader.
//!
//! One record per line, space-delimited, selected by the leading token:
//!
//! ```text
//! A <side> <orderType> <price> <quantity> <orderId>
//! M <orderId> <side> <price> <quantity>
//! C <orderId>
//! R <totalOrders> <bidLevels> <askLevels>
//! ```
//!
//! The `R` record states the expected final book shape and must be the
//! final non-empty line; a blank line terminates input. Every malformed
//! record is fatal to the run.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::command::{ModifyOrder, Order, OrderId, OrderType, Price, Quantity, Side};

/// One parsed book instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Add(Order),
    Modify(ModifyOrder),
    Cancel(OrderId),
}

/// The `R` record: expected final counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpectedState {
    pub total_orders: u32,
    pub bid_levels: u32,
    pub ask_levels: u32,
}

/// A fully parsed instruction file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    pub instructions: Vec<Instruction>,
    pub expected: ExpectedState,
}

/// Everything that can go wrong reading an instruction file. All fatal.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: invalid action {action:?}")]
    InvalidAction { line: usize, action: char },

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: value {value} cannot be negative")]
    NegativeNumber { line: usize, value: i64 },

    #[error("line {line}: unknown order type {token:?}")]
    UnknownOrderType { line: usize, token: String },

    #[error("line {line}: unknown side {token:?}")]
    UnknownSide { line: usize, token: String },

    #[error("line {line}: order id must be non-zero")]
    ZeroOrderId { line: usize },

    #[error("line {line}: quantity must be positive")]
    ZeroQuantity { line: usize },

    #[error("line {line}: the result line must be the final non-empty line")]
    MisplacedResult { line: usize },

    #[error("missing result line")]
    MissingResult,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read and parse an instruction file from disk.
pub fn read_script(path: &Path) -> Result<Script, ParseError> {
    parse_script(&fs::read_to_string(path)?)
}

/// Parse instruction-file text.
pub fn parse_script(input: &str) -> Result<Script, ParseError> {
    let mut instructions = Vec::new();
    let mut expected: Option<ExpectedState> = None;
    let mut result_line = 0usize;

    for (index, raw) in input.lines().enumerate() {
        let line = index + 1;
        if raw.trim().is_empty() {
            // A blank line terminates input
            break;
        }

        if expected.is_some() {
            return Err(ParseError::MisplacedResult { line: result_line });
        }

        let fields: Vec<&str> = raw.split(' ').collect();
        let action = raw.chars().next().unwrap_or(' ');
        match action {
            'A' => {
                expect_fields(line, &fields, 6)?;
                let side = parse_side(line, fields[1])?;
                let order_type = parse_order_type(line, fields[2])?;
                let price = parse_price(line, fields[3])?;
                let quantity = parse_quantity(line, fields[4])?;
                let order_id = parse_order_id(line, fields[5])?;

                // A Market order's price field is carried but ignored;
                // the book assigns the worst opposite price on arrival.
                let order = if order_type == OrderType::Market {
                    Order::market(order_id, side, quantity)
                } else {
                    Order::new(order_type, order_id, side, price, quantity)
                };
                instructions.push(Instruction::Add(order));
            }
            'M' => {
                expect_fields(line, &fields, 5)?;
                let order_id = parse_order_id(line, fields[1])?;
                let side = parse_side(line, fields[2])?;
                let price = parse_price(line, fields[3])?;
                let quantity = parse_quantity(line, fields[4])?;
                instructions.push(Instruction::Modify(ModifyOrder {
                    order_id,
                    side,
                    price,
                    quantity,
                }));
            }
            'C' => {
                expect_fields(line, &fields, 2)?;
                let order_id = parse_order_id(line, fields[1])?;
                instructions.push(Instruction::Cancel(order_id));
            }
            'R' => {
                expect_fields(line, &fields, 4)?;
                expected = Some(ExpectedState {
                    total_orders: parse_u32(line, fields[1])?,
                    bid_levels: parse_u32(line, fields[2])?,
                    ask_levels: parse_u32(line, fields[3])?,
                });
                result_line = line;
            }
            other => return Err(ParseError::InvalidAction { line, action: other }),
        }
    }

    match expected {
        Some(expected) => Ok(Script {
            instructions,
            expected,
        }),
        None => Err(ParseError::MissingResult),
    }
}

fn expect_fields(line: usize, fields: &[&str], expected: usize) -> Result<(), ParseError> {
    if fields.len() != expected {
        return Err(ParseError::FieldCount {
            line,
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn parse_number(line: usize, token: &str) -> Result<i64, ParseError> {
    let value = token.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
    })?;
    if value < 0 {
        return Err(ParseError::NegativeNumber { line, value });
    }
    Ok(value)
}

fn parse_u32(line: usize, token: &str) -> Result<u32, ParseError> {
    u32::try_from(parse_number(line, token)?).map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}

fn parse_price(line: usize, token: &str) -> Result<Price, ParseError> {
    parse_u32(line, token)
}

fn parse_quantity(line: usize, token: &str) -> Result<Quantity, ParseError> {
    let quantity = parse_u32(line, token)?;
    if quantity == 0 {
        return Err(ParseError::ZeroQuantity { line });
    }
    Ok(quantity)
}

fn parse_order_id(line: usize, token: &str) -> Result<OrderId, ParseError> {
    let order_id = parse_number(line, token)? as OrderId;
    if order_id == 0 {
        return Err(ParseError::ZeroOrderId { line });
    }
    Ok(order_id)
}

fn parse_side(line: usize, token: &str) -> Result<Side, ParseError> {
    match token.chars().next() {
        Some('B') => Ok(Side::Buy),
        Some('S') => Ok(Side::Sell),
        _ => Err(ParseError::UnknownSide {
            line,
            token: token.to_string(),
        }),
    }
}

fn parse_order_type(line: usize, token: &str) -> Result<OrderType, ParseError> {
    match token {
        "Market" => Ok(OrderType::Market),
        "FillAndKill" => Ok(OrderType::FillAndKill),
        "FillOrKill" => Ok(OrderType::FillOrKill),
        "GoodForDay" => Ok(OrderType::GoodForDay),
        "GoodTillCancel" => Ok(OrderType::GoodTillCancel),
        _ => Err(ParseError::UnknownOrderType {
            line,
            token: token.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::INVALID_PRICE;

    #[test]
    fn test_parse_add() {
        let script = parse_script("A B GoodTillCancel 100 10 1\nR 1 1 0\n").unwrap();
        assert_eq!(script.instructions.len(), 1);
        assert_eq!(
            script.instructions[0],
            Instruction::Add(Order::new(OrderType::GoodTillCancel, 1, Side::Buy, 100, 10))
        );
        assert_eq!(
            script.expected,
            ExpectedState {
                total_orders: 1,
                bid_levels: 1,
                ask_levels: 0
            }
        );
    }

    #[test]
    fn test_parse_market_ignores_price_field() {
        let script = parse_script("A B Market 0 20 3\nR 1 1 0\n").unwrap();
        let Instruction::Add(order) = script.instructions[0] else {
            panic!("expected an add");
        };
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.price, INVALID_PRICE);
        assert_eq!(order.quantity, 20);
    }

    #[test]
    fn test_parse_modify_and_cancel() {
        let script = parse_script("M 1 B 100 5\nC 7\nR 0 0 0\n").unwrap();
        assert_eq!(
            script.instructions,
            vec![
                Instruction::Modify(ModifyOrder {
                    order_id: 1,
                    side: Side::Buy,
                    price: 100,
                    quantity: 5
                }),
                Instruction::Cancel(7),
            ]
        );
    }

    #[test]
    fn test_side_token_prefix() {
        let script = parse_script("A Buy GoodTillCancel 100 10 1\nA Sell GoodTillCancel 110 10 2\nR 2 1 1\n")
            .unwrap();
        let Instruction::Add(buy) = script.instructions[0] else {
            panic!()
        };
        let Instruction::Add(sell) = script.instructions[1] else {
            panic!()
        };
        assert_eq!(buy.side, Side::Buy);
        assert_eq!(sell.side, Side::Sell);
    }

    #[test]
    fn test_blank_line_terminates() {
        let script = parse_script("A B GoodTillCancel 100 10 1\nR 1 1 0\n\nA B GoodTillCancel 1 1 2\n");
        // Everything past the blank line is ignored
        assert_eq!(script.unwrap().instructions.len(), 1);
    }

    #[test]
    fn test_invalid_action() {
        let err = parse_script("X B GoodTillCancel 100 10 1\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidAction { line: 1, action: 'X' }));
    }

    #[test]
    fn test_missing_fields() {
        let err = parse_script("A B GoodTillCancel 100 10\nR 0 0 0\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::FieldCount {
                line: 1,
                expected: 6,
                found: 5
            }
        ));
    }

    #[test]
    fn test_non_numeric() {
        let err = parse_script("A B GoodTillCancel abc 10 1\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { line: 1, .. }));
    }

    #[test]
    fn test_negative_number() {
        let err = parse_script("A B GoodTillCancel -5 10 1\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::NegativeNumber { line: 1, value: -5 }));
    }

    #[test]
    fn test_unknown_order_type() {
        let err = parse_script("A B GoodUntilMonday 100 10 1\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownOrderType { line: 1, .. }));
    }

    #[test]
    fn test_unknown_side() {
        let err = parse_script("A X GoodTillCancel 100 10 1\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownSide { line: 1, .. }));
    }

    #[test]
    fn test_zero_order_id() {
        let err = parse_script("A B GoodTillCancel 100 10 0\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::ZeroOrderId { line: 1 }));
    }

    #[test]
    fn test_zero_quantity() {
        let err = parse_script("A B GoodTillCancel 100 0 1\nR 0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::ZeroQuantity { line: 1 }));
    }

    #[test]
    fn test_missing_result() {
        let err = parse_script("A B GoodTillCancel 100 10 1\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingResult));
    }

    #[test]
    fn test_misplaced_result() {
        let err = parse_script("R 0 0 0\nA B GoodTillCancel 100 10 1\n").unwrap_err();
        assert!(matches!(err, ParseError::MisplacedResult { line: 1 }));
    }
}
