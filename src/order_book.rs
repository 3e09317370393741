//! Order book state - ladders, order index, and aggregate depth.
//!
//! Owns every mutable structure and keeps the id index pointing at the
//! arena node for each live order so cancellation never scans. The
//! operational layer (matching, policy gates, cancel/modify paths) lives
//! in [`crate::matching`].

use rustc_hash::FxHashMap;

use crate::arena::{Arena, ArenaIndex};
use crate::command::{LevelInfo, OrderId, Price, Side};
use crate::depth::DepthMap;
use crate::ladder::Ladder;

/// Mapping from order id to its arena handle, for O(1) cancel lookup.
/// The handle doubles as the locator into the order's level queue.
pub type OrderMap = FxHashMap<OrderId, ArenaIndex>;

/// The central limit order book.
///
/// Single-threaded core; [`crate::Engine`] wraps it in the book lock.
pub struct OrderBook {
    /// Storage for every resting order
    pub(crate) arena: Arena,
    /// Buy-side ladder, best = highest price
    pub(crate) bids: Ladder,
    /// Sell-side ladder, best = lowest price
    pub(crate) asks: Ladder,
    /// Order lookup: id -> arena handle
    pub(crate) orders: OrderMap,
    /// Per-price aggregates across both sides
    pub(crate) depth: DepthMap,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            bids: Ladder::new(Side::Buy),
            asks: Ladder::new(Side::Sell),
            orders: OrderMap::default(),
            depth: DepthMap::new(),
        }
    }

    /// Create an order book pre-sized for `orders` resting orders
    pub fn with_capacity(orders: usize) -> Self {
        Self {
            arena: Arena::with_capacity(orders),
            bids: Ladder::new(Side::Buy),
            asks: Ladder::new(Side::Sell),
            orders: OrderMap::with_capacity_and_hasher(orders, Default::default()),
            depth: DepthMap::new(),
        }
    }

    /// The ladder holding orders of `side`
    #[inline]
    pub(crate) fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Check if an order id is live in the book
    #[inline]
    pub fn contains_order(&self, order_id: OrderId) -> bool {
        self.orders.contains_key(&order_id)
    }

    /// Look up a live order's arena handle
    #[inline]
    pub fn locate(&self, order_id: OrderId) -> Option<ArenaIndex> {
        self.orders.get(&order_id).copied()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of live orders across both sides
    #[inline]
    pub fn size(&self) -> usize {
        self.orders.len()
    }

    /// Best bid price (highest buy)
    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best()
    }

    /// Best ask price (lowest sell)
    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best()
    }

    /// Per-side level snapshots `(bids, asks)`, each ordered best-first
    /// with the total remaining quantity resting at that price.
    pub fn level_infos(&self) -> (Vec<LevelInfo>, Vec<LevelInfo>) {
        let bids = self
            .bids
            .iter()
            .map(|(price, _)| LevelInfo {
                price,
                quantity: self.depth.side_qty(Side::Buy, price),
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .map(|(price, _)| LevelInfo {
                price,
                quantity: self.depth.side_qty(Side::Sell, price),
            })
            .collect();
        (bids, asks)
    }

    /// Number of populated bid levels
    #[inline]
    pub fn bid_levels(&self) -> usize {
        self.bids.depth()
    }

    /// Number of populated ask levels
    #[inline]
    pub fn ask_levels(&self) -> usize {
        self.asks.depth()
    }

    /// Check if the book is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    // ========================================================================
    // Consistency checking (test builds only)
    // ========================================================================

    /// Walk every structure and cross-check them against each other.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use crate::arena::NULL_INDEX;
        use crate::depth::LevelData;
        use std::collections::BTreeMap;

        // Every indexed order sits in the level its node names, at a
        // position reachable from that level's head.
        for (&order_id, &handle) in &self.orders {
            let node = self.arena.get(handle);
            assert_eq!(node.order_id, order_id, "index id does not match node");
            assert!(node.remaining_qty > 0, "filled order still indexed");

            let level = self
                .ladder(node.side)
                .level(node.price)
                .unwrap_or_else(|| panic!("order {order_id} names a missing level"));
            let mut cursor = level.head;
            let mut found = false;
            while cursor != NULL_INDEX {
                if cursor == handle {
                    found = true;
                    break;
                }
                cursor = self.arena.get(cursor).next;
            }
            assert!(found, "order {order_id} not reachable from its level head");
        }

        // No empty levels, and recomputed aggregates match the depth map.
        let mut expected: BTreeMap<Price, LevelData> = BTreeMap::new();
        for ladder in [&self.bids, &self.asks] {
            for (price, level) in ladder.iter() {
                assert!(!level.is_empty(), "empty level retained at {price}");
                let mut cursor = level.head;
                let mut walked = 0u32;
                while cursor != NULL_INDEX {
                    let node = self.arena.get(cursor);
                    let entry = expected.entry(price).or_default();
                    entry.count += 1;
                    match node.side {
                        Side::Buy => entry.bid_qty += node.remaining_qty,
                        Side::Sell => entry.ask_qty += node.remaining_qty,
                    }
                    walked += 1;
                    cursor = node.next;
                }
                assert_eq!(walked, level.len, "level length drifted at {price}");
            }
        }
        for (&price, data) in &expected {
            assert_eq!(
                self.depth.get(price),
                Some(data),
                "depth map disagrees at {price}"
            );
        }
        assert_eq!(self.depth.len(), expected.len(), "stale depth entries");

        // Matching always drives crossing to exhaustion.
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            assert!(bid < ask, "book left crossed: bid {bid} >= ask {ask}");
        }
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("bid_levels", &self.bids.depth())
            .field("ask_levels", &self.asks.depth())
            .field("order_count", &self.orders.len())
            .finish()
    }
}
