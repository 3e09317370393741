//! Side ladder - price-ordered map from price to the FIFO level there.
//!
//! One ladder per side. Both are keyed ascending; which end of the map is
//! "best" depends on the side:
//! - Bids: highest price is best (back of the map)
//! - Asks: lowest price is best (front of the map)
//!
//! Empty levels are removed immediately; the ladder never retains a price
//! with no orders.

use std::collections::BTreeMap;

use crate::command::{Price, Side};
use crate::price_level::PriceLevel;

/// All resting orders on one side of the book, grouped by price.
#[derive(Debug)]
pub struct Ladder {
    side: Side,
    levels: BTreeMap<Price, PriceLevel>,
}

impl Ladder {
    /// Create an empty ladder for the given side
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// True if the side holds no orders at all
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of populated price levels
    #[inline]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Best price on this side: highest bid, lowest ask.
    #[inline]
    pub fn best(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.keys().next_back().copied(),
            Side::Sell => self.levels.keys().next().copied(),
        }
    }

    /// Worst price on this side: lowest bid, highest ask. This is the
    /// price a Market order on the opposite side promotes to.
    #[inline]
    pub fn worst(&self) -> Option<Price> {
        match self.side {
            Side::Buy => self.levels.keys().next().copied(),
            Side::Sell => self.levels.keys().next_back().copied(),
        }
    }

    /// Get the level at a price (immutable)
    #[inline]
    pub fn level(&self, price: Price) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    /// Get the level at a price (mutable)
    #[inline]
    pub fn level_mut(&mut self, price: Price) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Get or create the level at a price
    #[inline]
    pub fn level_or_insert(&mut self, price: Price) -> &mut PriceLevel {
        self.levels.entry(price).or_insert_with(PriceLevel::new)
    }

    /// Drop a price level outright. Callers only do this once the level's
    /// queue is empty.
    #[inline]
    pub fn remove_level(&mut self, price: Price) {
        self.levels.remove(&price);
    }

    /// Iterate populated levels best-first in this side's priority order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Price, &PriceLevel)> + '_> {
        match self.side {
            Side::Buy => Box::new(self.levels.iter().rev().map(|(p, l)| (*p, l))),
            Side::Sell => Box::new(self.levels.iter().map(|(p, l)| (*p, l))),
        }
    }
}
