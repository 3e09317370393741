//! Domain vocabulary for the matching engine.
//!
//! Incoming orders and modify requests are inputs from the driver.
//! Trades and level snapshots are outputs to its consumers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Price in integer ticks.
pub type Price = u32;
/// Order quantity in integer units.
pub type Quantity = u32;
/// Client-assigned order identifier. Zero is never a valid id.
pub type OrderId = u64;

/// Sentinel carried by a freshly arrived Market order until it is promoted
/// to a limit price. Never rests in the book.
pub const INVALID_PRICE: Price = Price::MAX;

/// Order side (buy = bid, sell = ask)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Lifetime/fill policy of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum OrderType {
    /// Rests until filled or cancelled (default)
    #[default]
    GoodTillCancel = 0,
    /// Rests until filled, cancelled, or the daily 16:00 cutoff
    GoodForDay = 1,
    /// Rejected unless it crosses; any residual left at top-of-book after
    /// matching is cancelled
    FillAndKill = 2,
    /// Rejected unless the full quantity can be filled immediately
    FillOrKill = 3,
    /// Promoted to GoodTillCancel at the worst opposite price on arrival
    Market = 4,
}

/// An incoming order, as handed to [`Engine::add_order`](crate::Engine::add_order).
///
/// A Market order carries [`INVALID_PRICE`] until the book promotes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Order {
    pub order_id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: Quantity,
}

impl Order {
    #[inline]
    pub fn new(
        order_type: OrderType,
        order_id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        debug_assert!(order_id != 0, "order id 0 is reserved");
        debug_assert!(quantity > 0, "orders must have positive quantity");
        Self {
            order_id,
            side,
            order_type,
            price,
            quantity,
        }
    }

    /// A Market order: price is the internal sentinel until promotion.
    #[inline]
    pub fn market(order_id: OrderId, side: Side, quantity: Quantity) -> Self {
        Self::new(OrderType::Market, order_id, side, INVALID_PRICE, quantity)
    }

    /// Convert a Market order into a GoodTillCancel limit order at `price`.
    ///
    /// # Panics
    /// Panics if the order is not a Market order.
    pub fn promote_to_gtc(&mut self, price: Price) {
        assert!(
            self.order_type == OrderType::Market,
            "only Market orders can have their price adjusted"
        );
        self.price = price;
        self.order_type = OrderType::GoodTillCancel;
    }
}

/// Replace request: the target order keeps its id and type but is re-queued
/// with the new side/price/quantity, losing its arrival priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModifyOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl ModifyOrder {
    /// The replacement order, carrying the preserved `order_type`.
    #[inline]
    pub fn to_order(self, order_type: OrderType) -> Order {
        Order::new(
            order_type,
            self.order_id,
            self.side,
            self.price,
            self.quantity,
        )
    }
}

/// One side of an execution. `price` is the resting price of that leg's
/// own order, so the two legs of a [`Trade`] may differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TradeLeg {
    pub order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
}

/// A matched pair of order legs. Quantities are always equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trade {
    pub buy: TradeLeg,
    pub sell: TradeLeg,
}

/// One populated price level in a book snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LevelInfo {
    pub price: Price,
    pub quantity: Quantity,
}
