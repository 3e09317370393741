//! Matching - policy gates, the cross loop, and the mutating paths.
//!
//! Implements the add/cancel/modify algorithm:
//! 1. GATE: Market promotion, FillAndKill cross check, FillOrKill
//!    liquidity check, duplicate-id rejection
//! 2. REST: append to the side ladder, index, and depth map
//! 3. CROSS: match top-of-book pairs until the book uncrosses
//!
//! Domain rejections (duplicate id, Market into an empty opposite side,
//! FillAndKill without a cross, FillOrKill without full liquidity, unknown
//! id on cancel/modify) are silent no-ops returning no trades.

use crate::command::{ModifyOrder, Order, OrderId, OrderType, Price, Quantity, Side, Trade, TradeLeg};
use crate::depth::LevelAction;
use crate::order_book::OrderBook;

impl OrderBook {
    // ========================================================================
    // Crossing predicates
    // ========================================================================

    /// True if an order at `price` on `side` would cross the opposite
    /// top-of-book.
    pub fn can_match(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.asks.best().is_some_and(|best_ask| price >= best_ask),
            Side::Sell => self.bids.best().is_some_and(|best_bid| price <= best_bid),
        }
    }

    /// True if crossing liquidity suffices to fill `quantity` outright.
    ///
    /// Walks the depth map from the opposite top-of-book in the incoming
    /// order's favourable direction. The top-of-book threshold also guards
    /// against counting entries on the wrong side of the spread.
    pub fn can_fully_fill(&self, side: Side, price: Price, quantity: Quantity) -> bool {
        if !self.can_match(side, price) {
            return false;
        }

        let mut needed = quantity;
        match side {
            Side::Buy => {
                let Some(threshold) = self.asks.best() else {
                    return false;
                };
                for (_, data) in self.depth.range(threshold..=price) {
                    if data.ask_qty == 0 {
                        continue;
                    }
                    if data.ask_qty >= needed {
                        return true;
                    }
                    needed -= data.ask_qty;
                }
            }
            Side::Sell => {
                let Some(threshold) = self.bids.best() else {
                    return false;
                };
                for (_, data) in self.depth.range(price..=threshold).rev() {
                    if data.bid_qty == 0 {
                        continue;
                    }
                    if data.bid_qty >= needed {
                        return true;
                    }
                    needed -= data.bid_qty;
                }
            }
        }
        false
    }

    // ========================================================================
    // Mutating operations
    // ========================================================================

    /// Gate, rest, and match an incoming order.
    ///
    /// Returns the trades produced; an empty list for every domain
    /// rejection.
    pub fn add_order(&mut self, order: Order) -> Vec<Trade> {
        if self.orders.contains_key(&order.order_id) {
            return Vec::new();
        }

        let mut order = order;
        if order.order_type == OrderType::Market {
            // Promote at the worst price on the opposite ladder; with no
            // opposite liquidity there is nothing to price against.
            match self.ladder(order.side.opposite()).worst() {
                Some(worst) => order.promote_to_gtc(worst),
                None => return Vec::new(),
            }
        }

        if order.order_type == OrderType::FillAndKill && !self.can_match(order.side, order.price) {
            return Vec::new();
        }

        if order.order_type == OrderType::FillOrKill
            && !self.can_fully_fill(order.side, order.price, order.quantity)
        {
            return Vec::new();
        }

        let handle = self.arena.insert(&order);
        match order.side {
            Side::Buy => self
                .bids
                .level_or_insert(order.price)
                .push_back(&mut self.arena, handle),
            Side::Sell => self
                .asks
                .level_or_insert(order.price)
                .push_back(&mut self.arena, handle),
        }
        self.orders.insert(order.order_id, handle);
        self.depth
            .update(order.side, order.price, order.quantity, LevelAction::Add);

        self.match_orders()
    }

    /// Cancel a live order. Unknown ids are a no-op.
    pub fn cancel_order(&mut self, order_id: OrderId) {
        let Some(handle) = self.orders.remove(&order_id) else {
            return;
        };
        let node = *self.arena.get(handle);

        let ladder = match node.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = ladder.level_mut(node.price) {
            let now_empty = level.remove(&mut self.arena, handle);
            if now_empty {
                ladder.remove_level(node.price);
            }
        }

        self.depth
            .update(node.side, node.price, node.remaining_qty, LevelAction::Remove);
        self.arena.free(handle);
    }

    /// Cancel a batch of orders (the expiry worker's path).
    pub fn cancel_orders(&mut self, order_ids: &[OrderId]) {
        for &order_id in order_ids {
            self.cancel_order(order_id);
        }
    }

    /// Replace a live order, preserving its type and id but re-queueing it
    /// at the back of its new level. Unknown ids are a no-op.
    pub fn modify_order(&mut self, modify: ModifyOrder) -> Vec<Trade> {
        let Some(handle) = self.locate(modify.order_id) else {
            return Vec::new();
        };
        let order_type = self.arena.get(handle).order_type;

        self.cancel_order(modify.order_id);
        self.add_order(modify.to_order(order_type))
    }

    /// Ids of every live GoodForDay order, for the daily expiry sweep.
    pub fn good_for_day_ids(&self) -> Vec<OrderId> {
        self.orders
            .iter()
            .filter(|&(_, &handle)| self.arena.get(handle).order_type == OrderType::GoodForDay)
            .map(|(&order_id, _)| order_id)
            .collect()
    }

    // ========================================================================
    // The cross loop
    // ========================================================================

    /// Match top-of-book pairs until the spread opens or a side empties.
    ///
    /// Each trade leg carries its own order's resting price. The depth map
    /// is told about every fill: `Match` for a partial, `Remove` for a
    /// fill-to-zero.
    pub(crate) fn match_orders(&mut self) -> Vec<Trade> {
        let mut trades = Vec::new();

        loop {
            let (Some(bid_price), Some(ask_price)) = (self.bids.best(), self.asks.best()) else {
                break;
            };
            if bid_price < ask_price {
                break;
            }

            // Work the two front queues against each other until one side
            // of the pair is exhausted.
            loop {
                let bid_head = match self.bids.level(bid_price) {
                    Some(level) if !level.is_empty() => level.peek_head(),
                    _ => break,
                };
                let ask_head = match self.asks.level(ask_price) {
                    Some(level) if !level.is_empty() => level.peek_head(),
                    _ => break,
                };

                let quantity = self
                    .arena
                    .get(bid_head)
                    .remaining_qty
                    .min(self.arena.get(ask_head).remaining_qty);

                self.arena.get_mut(bid_head).fill(quantity);
                self.arena.get_mut(ask_head).fill(quantity);

                let bid_node = *self.arena.get(bid_head);
                let ask_node = *self.arena.get(ask_head);

                if bid_node.is_filled() {
                    self.bids
                        .level_mut(bid_price)
                        .expect("bid level present while matching")
                        .pop_front(&mut self.arena);
                    self.orders.remove(&bid_node.order_id);
                    self.arena.free(bid_head);
                }

                if ask_node.is_filled() {
                    self.asks
                        .level_mut(ask_price)
                        .expect("ask level present while matching")
                        .pop_front(&mut self.arena);
                    self.orders.remove(&ask_node.order_id);
                    self.arena.free(ask_head);
                }

                trades.push(Trade {
                    buy: TradeLeg {
                        order_id: bid_node.order_id,
                        price: bid_node.price,
                        quantity,
                    },
                    sell: TradeLeg {
                        order_id: ask_node.order_id,
                        price: ask_node.price,
                        quantity,
                    },
                });

                let bid_action = if bid_node.is_filled() {
                    LevelAction::Remove
                } else {
                    LevelAction::Match
                };
                let ask_action = if ask_node.is_filled() {
                    LevelAction::Remove
                } else {
                    LevelAction::Match
                };
                self.depth
                    .update(Side::Buy, bid_node.price, quantity, bid_action);
                self.depth
                    .update(Side::Sell, ask_node.price, quantity, ask_action);
            }

            // Drop emptied price levels
            if self.bids.level(bid_price).is_some_and(|l| l.is_empty()) {
                self.bids.remove_level(bid_price);
            }
            if self.asks.level(ask_price).is_some_and(|l| l.is_empty()) {
                self.asks.remove_level(ask_price);
            }

            // A FillAndKill residual must not rest. Only the new
            // top-of-book can hold one: the gate rejects non-crossing FAK
            // orders, so a resting FAK was top-of-book when it arrived.
            if let Some(price) = self.bids.best() {
                let head = self.bids.level(price).map(|l| l.peek_head());
                if let Some(head) = head {
                    let node = self.arena.get(head);
                    if node.order_type == OrderType::FillAndKill {
                        let order_id = node.order_id;
                        self.cancel_order(order_id);
                    }
                }
            }
            if let Some(price) = self.asks.best() {
                let head = self.asks.level(price).map(|l| l.peek_head());
                if let Some(head) = head {
                    let node = self.arena.get(head);
                    if node.order_type == OrderType::FillAndKill {
                        let order_id = node.order_id;
                        self.cancel_order(order_id);
                    }
                }
            }
        }

        trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(
        order_type: OrderType,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Quantity,
    ) -> Order {
        Order::new(order_type, order_id, side, price, qty)
    }

    fn gtc(order_id: OrderId, side: Side, price: Price, qty: Quantity) -> Order {
        order(OrderType::GoodTillCancel, order_id, side, price, qty)
    }

    #[test]
    fn test_no_cross_rests() {
        let mut book = OrderBook::new();
        let trades = book.add_order(gtc(1, Side::Buy, 100, 10));
        assert!(trades.is_empty());
        assert_eq!(book.size(), 1);
        book.assert_consistent();
    }

    #[test]
    fn test_full_match_both_sides() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));
        let trades = book.add_order(gtc(2, Side::Sell, 100, 10));

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy.order_id, 1);
        assert_eq!(trades[0].sell.order_id, 2);
        assert_eq!(trades[0].buy.quantity, 10);
        assert_eq!(trades[0].sell.quantity, 10);
        assert!(book.is_empty());
        book.assert_consistent();
    }

    #[test]
    fn test_partial_fill_residual_rests() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));
        let trades = book.add_order(gtc(2, Side::Sell, 100, 4));

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy.quantity, 4);
        assert_eq!(book.size(), 1);
        assert_eq!(book.best_bid(), Some(100));

        let (bids, _) = book.level_infos();
        assert_eq!(bids[0].quantity, 6);
        book.assert_consistent();
    }

    #[test]
    fn test_trade_legs_carry_resting_prices() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 5));
        let trades = book.add_order(gtc(2, Side::Buy, 103, 5));

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy.price, 103);
        assert_eq!(trades[0].sell.price, 100);
        assert!(trades[0].buy.price >= trades[0].sell.price);
    }

    #[test]
    fn test_sweep_multiple_levels_fifo() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 50));
        book.add_order(gtc(2, Side::Sell, 101, 50));
        book.add_order(gtc(3, Side::Sell, 102, 50));

        let trades = book.add_order(gtc(4, Side::Buy, 102, 120));

        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].sell.price, 100);
        assert_eq!(trades[1].sell.price, 101);
        assert_eq!(trades[2].sell.price, 102);
        assert_eq!(trades[2].sell.quantity, 20);

        // 30 left on order 3 at 102
        assert_eq!(book.size(), 1);
        assert_eq!(book.best_ask(), Some(102));
        book.assert_consistent();
    }

    #[test]
    fn test_fifo_within_level() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 10));
        book.add_order(gtc(2, Side::Sell, 100, 10));
        book.add_order(gtc(3, Side::Sell, 100, 10));

        let trades = book.add_order(gtc(4, Side::Buy, 100, 20));

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sell.order_id, 1);
        assert_eq!(trades[1].sell.order_id, 2);
        assert_eq!(book.size(), 1);
        book.assert_consistent();
    }

    #[test]
    fn test_duplicate_id_is_noop() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));
        let trades = book.add_order(gtc(1, Side::Sell, 90, 5));

        assert!(trades.is_empty());
        assert_eq!(book.size(), 1);
        assert_eq!(book.best_ask(), None);
        book.assert_consistent();
    }

    #[test]
    fn test_cancel_unknown_is_noop() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));
        book.cancel_order(999);
        assert_eq!(book.size(), 1);
        book.assert_consistent();
    }

    #[test]
    fn test_add_cancel_round_trip() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));

        book.add_order(gtc(2, Side::Buy, 100, 5));
        book.cancel_order(2);

        assert_eq!(book.size(), 1);
        let (bids, asks) = book.level_infos();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].quantity, 10);
        assert!(asks.is_empty());
        book.assert_consistent();
    }

    // ------------------------------------------------------------------
    // Market orders
    // ------------------------------------------------------------------

    #[test]
    fn test_market_promotes_to_worst_opposite() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 5));
        book.add_order(gtc(2, Side::Sell, 110, 5));

        let trades = book.add_order(Order::market(3, Side::Buy, 20));

        // Consumes both asks for 10, residual 10 rests as GTC at 110
        assert_eq!(trades.len(), 2);
        assert_eq!(book.size(), 1);
        assert_eq!(book.best_bid(), Some(110));
        assert_eq!(book.best_ask(), None);

        let (bids, _) = book.level_infos();
        assert_eq!(bids[0].quantity, 10);
        book.assert_consistent();
    }

    #[test]
    fn test_market_buy_leg_price_is_promoted_price() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 5));
        book.add_order(gtc(2, Side::Sell, 110, 5));

        let trades = book.add_order(Order::market(3, Side::Buy, 10));

        assert_eq!(trades[0].buy.price, 110);
        assert_eq!(trades[0].sell.price, 100);
        assert_eq!(trades[1].buy.price, 110);
        assert_eq!(trades[1].sell.price, 110);
    }

    #[test]
    fn test_market_into_empty_opposite_is_dropped() {
        let mut book = OrderBook::new();
        let trades = book.add_order(Order::market(1, Side::Buy, 10));
        assert!(trades.is_empty());
        assert!(book.is_empty());
        book.assert_consistent();
    }

    #[test]
    fn test_market_sell_promotes_to_lowest_bid() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 90, 5));
        book.add_order(gtc(2, Side::Buy, 100, 5));

        let trades = book.add_order(Order::market(3, Side::Sell, 20));

        assert_eq!(trades.len(), 2);
        // First against the best bid 100, then 90; residual rests at 90
        assert_eq!(trades[0].buy.price, 100);
        assert_eq!(trades[1].buy.price, 90);
        assert_eq!(book.best_ask(), Some(90));
        assert_eq!(book.best_bid(), None);
        book.assert_consistent();
    }

    // ------------------------------------------------------------------
    // FillAndKill
    // ------------------------------------------------------------------

    #[test]
    fn test_fak_without_cross_is_dropped() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));

        let trades = book.add_order(order(OrderType::FillAndKill, 2, Side::Sell, 101, 5));

        assert!(trades.is_empty());
        assert_eq!(book.size(), 1);
        book.assert_consistent();
    }

    #[test]
    fn test_fak_residual_is_cancelled() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 4));

        let trades = book.add_order(order(OrderType::FillAndKill, 2, Side::Sell, 100, 10));

        // Fills 4, the leftover 6 must not rest
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].sell.quantity, 4);
        assert!(book.is_empty());
        book.assert_consistent();
    }

    #[test]
    fn test_fak_full_fill_leaves_no_residue() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 10));

        let trades = book.add_order(order(OrderType::FillAndKill, 2, Side::Sell, 100, 10));

        assert_eq!(trades.len(), 1);
        assert!(book.is_empty());
        book.assert_consistent();
    }

    // ------------------------------------------------------------------
    // FillOrKill
    // ------------------------------------------------------------------

    #[test]
    fn test_fok_insufficient_liquidity_dropped_whole() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 3));
        book.add_order(gtc(2, Side::Sell, 100, 3));

        let trades = book.add_order(order(OrderType::FillOrKill, 3, Side::Buy, 100, 10));

        assert!(trades.is_empty());
        assert_eq!(book.size(), 2);
        let (_, asks) = book.level_infos();
        assert_eq!(asks[0].quantity, 6);
        book.assert_consistent();
    }

    #[test]
    fn test_fok_fills_across_levels() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 4));
        book.add_order(gtc(2, Side::Sell, 101, 4));

        let trades = book.add_order(order(OrderType::FillOrKill, 3, Side::Buy, 101, 8));

        assert_eq!(trades.len(), 2);
        assert!(book.is_empty());
        book.assert_consistent();
    }

    #[test]
    fn test_fok_ignores_levels_beyond_limit() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Sell, 100, 4));
        book.add_order(gtc(2, Side::Sell, 105, 100));

        // Only the 4 at 100 is acceptable; 8 cannot fully fill
        let trades = book.add_order(order(OrderType::FillOrKill, 3, Side::Buy, 100, 8));

        assert!(trades.is_empty());
        assert_eq!(book.size(), 2);
        book.assert_consistent();
    }

    #[test]
    fn test_fok_counts_only_opposite_side_quantity() {
        let mut book = OrderBook::new();
        // Buy depth at 100 must not be mistaken for ask liquidity
        book.add_order(gtc(1, Side::Buy, 99, 50));
        book.add_order(gtc(2, Side::Sell, 100, 5));

        let trades = book.add_order(order(OrderType::FillOrKill, 3, Side::Buy, 100, 10));

        assert!(trades.is_empty());
        assert_eq!(book.size(), 2);
        book.assert_consistent();
    }

    // ------------------------------------------------------------------
    // Modify
    // ------------------------------------------------------------------

    #[test]
    fn test_modify_loses_priority() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 5));
        book.add_order(gtc(2, Side::Buy, 100, 5));

        book.modify_order(ModifyOrder {
            order_id: 1,
            side: Side::Buy,
            price: 100,
            quantity: 5,
        });

        let trades = book.add_order(gtc(99, Side::Sell, 100, 5));

        // Order 2 now has time priority over the re-queued order 1
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy.order_id, 2);
        assert_eq!(book.size(), 2);
        book.assert_consistent();
    }

    #[test]
    fn test_modify_unknown_is_noop() {
        let mut book = OrderBook::new();
        let trades = book.modify_order(ModifyOrder {
            order_id: 999,
            side: Side::Buy,
            price: 100,
            quantity: 5,
        });
        assert!(trades.is_empty());
        assert!(book.is_empty());
    }

    #[test]
    fn test_modify_preserves_type() {
        let mut book = OrderBook::new();
        book.add_order(order(OrderType::GoodForDay, 1, Side::Buy, 100, 5));

        book.modify_order(ModifyOrder {
            order_id: 1,
            side: Side::Buy,
            price: 101,
            quantity: 5,
        });

        assert_eq!(book.good_for_day_ids(), vec![1]);
        book.assert_consistent();
    }

    #[test]
    fn test_modify_can_trigger_match() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 99, 5));
        book.add_order(gtc(2, Side::Sell, 101, 5));

        let trades = book.modify_order(ModifyOrder {
            order_id: 1,
            side: Side::Buy,
            price: 101,
            quantity: 5,
        });

        assert_eq!(trades.len(), 1);
        assert!(book.is_empty());
        book.assert_consistent();
    }

    // ------------------------------------------------------------------
    // Batch cancel / GoodForDay sweep
    // ------------------------------------------------------------------

    #[test]
    fn test_good_for_day_sweep() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 5));
        book.add_order(order(OrderType::GoodForDay, 2, Side::Buy, 99, 5));
        book.add_order(order(OrderType::GoodForDay, 3, Side::Sell, 105, 5));

        let mut day_orders = book.good_for_day_ids();
        day_orders.sort_unstable();
        assert_eq!(day_orders, vec![2, 3]);

        book.cancel_orders(&day_orders);
        assert_eq!(book.size(), 1);
        assert!(book.contains_order(1));
        book.assert_consistent();
    }

    #[test]
    fn test_cancel_orders_tolerates_unknown_ids() {
        let mut book = OrderBook::new();
        book.add_order(gtc(1, Side::Buy, 100, 5));
        book.cancel_orders(&[1, 2, 3]);
        assert!(book.is_empty());
        book.assert_consistent();
    }
}
