//! # Matchbook
//!
//! A price-time priority limit order book matching engine.
//!
//! ## Design
//!
//! - **Two ladders**: price-ordered maps of FIFO levels, bids iterating
//!   highest-first, asks lowest-first
//! - **Stable locators**: resting orders live in a slab; a u32 handle
//!   survives every mutation that does not touch that order
//! - **Aggregate depth**: per-price `{count, bid_qty, ask_qty}` maintained
//!   through a single update routine, used for FillOrKill liquidity checks
//!   and level snapshots
//! - **One lock**: all public operations run under a single book mutex; a
//!   background worker cancels GoodForDay orders at the 16:00 local cutoff
//!
//! ## Architecture
//!
//! ```text
//! [Instruction File] --> [replay driver] --> [Engine (mutex)] --> [Trades]
//!                                                  |
//!                                          [GFD expiry worker]
//! ```

pub mod arena;
pub mod command;
pub mod depth;
pub mod engine;
pub mod instructions;
pub mod ladder;
pub mod matching;
pub mod order_book;
pub mod price_level;

// Re-exports for convenience
pub use arena::{Arena, ArenaIndex, OrderNode, NULL_INDEX};
pub use command::{
    LevelInfo, ModifyOrder, Order, OrderId, OrderType, Price, Quantity, Side, Trade, TradeLeg,
    INVALID_PRICE,
};
pub use engine::Engine;
pub use instructions::{ExpectedState, Instruction, ParseError};
pub use order_book::OrderBook;
