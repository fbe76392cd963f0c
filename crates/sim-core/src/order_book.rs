//! Price/time-priority order book for a single symbol.
//!
//! The book keeps two sorted sequences of price levels (best level at index
//! zero on each side) and realises every matchable (incoming, resting) pair
//! with the resting order's advertised price. Notifications for the involved
//! agents are accumulated in an outbound queue that the owning exchange
//! drains and sends through the kernel; the book itself never talks to the
//! kernel.

use std::collections::{BTreeSet, VecDeque};
use tracing::debug;
use types::{
    AgentId, BookRecordKind, BookSnapshotRecord, LimitOrder, MarketOrder, Message, Nanos, Order,
    OrderId, OrderStreamRecord, Price, Quantity, Side, Symbol, Timestamp,
};

use crate::error::{BookError, Result};
use crate::price_level::{OrderMeta, PriceLevel};

/// Order tags suppressed by post-only preprocessing: an order carrying one of
/// these would have executed on entry and is dropped instead.
const POST_ONLY_TAGS: [&str; 2] = ["MR_preprocess_ADD", "MR_preprocess_REPLACE"];

/// What one matching step did with an incoming order.
enum ExecOutcome {
    /// The executed portion of the matched resting order.
    Matched(LimitOrder),
    /// No resting order matches; a limit order may now enter the book.
    NoMatch,
    /// The order would have executed on entry but carries a post-only
    /// preprocessing tag; it is dropped without entering.
    Suppressed,
}

/// An order book for one symbol, in the style of the major US stock
/// exchanges.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: Symbol,
    /// Bid levels, descending by price; `bids[0]` is the best bid.
    bids: Vec<PriceLevel>,
    /// Ask levels, ascending by price; `asks[0]` is the best ask.
    asks: Vec<PriceLevel>,
    /// Volume-weighted average price of the last incoming trade.
    last_trade: Option<Price>,
    /// Truncated history of resting-order events, newest last.
    history: VecDeque<OrderStreamRecord>,
    history_limit: Option<usize>,
    /// Timestamps and quantities of executions against resting asks (buy
    /// aggressors) and resting bids (sell aggressors).
    buy_transactions: Vec<(Timestamp, Quantity)>,
    sell_transactions: Vec<(Timestamp, Quantity)>,
    /// Last time the book contents changed.
    last_update_ts: Timestamp,
    book_logging: bool,
    book_log_depth: usize,
    book_log: Vec<BookSnapshotRecord>,
    quotes_seen: BTreeSet<Price>,
    /// Notifications awaiting dispatch by the owning exchange.
    outbound: Vec<(AgentId, Message)>,
    /// Event-log lines awaiting dispatch by the owning exchange.
    events: Vec<(String, String)>,
}

impl OrderBook {
    /// Create an empty book for one symbol.
    pub fn new(symbol: impl Into<Symbol>, opened_at: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            last_trade: None,
            history: VecDeque::new(),
            history_limit: None,
            buy_transactions: Vec::new(),
            sell_transactions: Vec::new(),
            last_update_ts: opened_at,
            book_logging: false,
            book_log_depth: 10,
            book_log: Vec::new(),
            quotes_seen: BTreeSet::new(),
            outbound: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Keep only the most recent `limit` history records.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = (limit > 0).then_some(limit);
        self
    }

    /// Snapshot the top `depth` levels into the book log after every
    /// execution.
    pub fn with_book_logging(mut self, depth: usize) -> Self {
        self.book_logging = true;
        self.book_log_depth = depth;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn last_trade(&self) -> Option<Price> {
        self.last_trade
    }

    pub fn last_update_ts(&self) -> Timestamp {
        self.last_update_ts
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn book_log(&self) -> &[BookSnapshotRecord] {
        &self.book_log
    }

    /// Prices ever quoted in this book.
    pub fn quotes_seen(&self) -> &BTreeSet<Price> {
        &self.quotes_seen
    }

    /// Take the notifications accumulated by recent operations.
    pub fn drain_notifications(&mut self) -> Vec<(AgentId, Message)> {
        std::mem::take(&mut self.outbound)
    }

    /// Take the event-log lines accumulated by recent operations.
    pub fn drain_events(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Order entry
    // =========================================================================

    /// Match a limit order or add it to the book.
    ///
    /// Partial matches are handled piecewise, consuming all possible shares
    /// at the best price before moving on. One execution notification is
    /// sent per match. With `quiet` set, no acceptance notification is sent
    /// (used when this call is part of a compound operation).
    pub fn handle_limit_order(
        &mut self,
        order: LimitOrder,
        now: Timestamp,
        quiet: bool,
    ) -> Result<()> {
        self.validate(&order.symbol, order.quantity)?;
        if order.limit_price.is_negative() {
            return Err(BookError::NegativePrice(order.limit_price));
        }

        let mut executed: Vec<(Quantity, Price)> = Vec::new();
        let mut incoming = Order::Limit(order);

        loop {
            match self.execute_order(&mut incoming, now) {
                ExecOutcome::Matched(matched) => {
                    executed.push((matched.quantity, matched.limit_price));
                    if incoming.quantity().is_zero() {
                        break;
                    }
                }
                ExecOutcome::NoMatch => {
                    if let Order::Limit(rest) = incoming {
                        self.enter_order(rest, now, quiet);
                    }
                    break;
                }
                ExecOutcome::Suppressed => break,
            }
        }

        if let Some(level) = self.bids.first() {
            self.events.push((
                "BEST_BID".to_string(),
                format!("{},{},{}", self.symbol, level.price, level.total_quantity()),
            ));
        }
        if let Some(level) = self.asks.first() {
            self.events.push((
                "BEST_ASK".to_string(),
                format!("{},{},{}", self.symbol, level.price, level.total_quantity()),
            ));
        }

        if !executed.is_empty() {
            let trade_qty: u64 = executed.iter().map(|(q, _)| q.raw()).sum();
            let notional: i64 = executed.iter().map(|(q, p)| p.raw() * q.raw() as i64).sum();
            let avg_price = Price((notional as f64 / trade_qty as f64).round() as i64);
            debug!(symbol = %self.symbol, qty = trade_qty, avg = %avg_price, "trade complete");
            self.last_trade = Some(avg_price);
            self.last_update_ts = now;
        }

        Ok(())
    }

    /// Fill a market order at the current best prices until its quantity is
    /// exhausted or the opposite side empties. Market orders never enter the
    /// book and receive no acceptance notification.
    pub fn handle_market_order(&mut self, order: MarketOrder, now: Timestamp) -> Result<()> {
        self.validate(&order.symbol, order.quantity)?;

        let mut incoming = Order::Market(order);
        while !incoming.quantity().is_zero() {
            match self.execute_order(&mut incoming, now) {
                ExecOutcome::Matched(_) => {}
                ExecOutcome::NoMatch | ExecOutcome::Suppressed => break,
            }
        }
        Ok(())
    }

    fn validate(&self, symbol: &str, quantity: Quantity) -> Result<()> {
        if symbol != self.symbol {
            return Err(BookError::SymbolMismatch {
                expected: self.symbol.clone(),
                got: symbol.to_string(),
            });
        }
        if quantity.is_zero() {
            return Err(BookError::ZeroQuantity);
        }
        Ok(())
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Find a single best match for `order`, without regard for quantity.
    ///
    /// Removes, or decrements quantity from, the matched resting order, so a
    /// `Matched` return means at least a partial trade happened. The
    /// incoming order's quantity is decremented by the matched amount.
    fn execute_order(&mut self, order: &mut Order, now: Timestamp) -> ExecOutcome {
        let aggressor_is_bid = order.side().is_bid();

        // Resting orders execute against the opposite side.
        let (matched, is_ptc_exec) = {
            let book = if aggressor_is_bid {
                &mut self.asks
            } else {
                &mut self.bids
            };

            if book.is_empty() {
                return ExecOutcome::NoMatch;
            }
            if let Order::Limit(limit) = &*order {
                if !book[0].order_is_match(limit) {
                    return ExecOutcome::NoMatch;
                }
            }
            if let Some(tag) = order.tag() {
                if POST_ONLY_TAGS.contains(&tag) {
                    // Would have executed at entry but was caught by the
                    // order-replacement preprocessing.
                    self.events.push((
                        format!("{tag}_POST_ONLY"),
                        format!("order_id={}", order.order_id().0),
                    ));
                    return ExecOutcome::Suppressed;
                }
            }

            let Some(resting_quantity) = book[0].front().map(|(o, _)| o.quantity) else {
                return ExecOutcome::NoMatch;
            };
            if order.quantity() >= resting_quantity {
                // Consume the entire resting order.
                let Some((matched, meta)) = book[0].pop() else {
                    return ExecOutcome::NoMatch;
                };
                let mut is_ptc = false;
                if matched.is_price_to_comply {
                    is_ptc = true;
                    debug_assert!(meta.ptc_hidden, "executed the visible half of a PTC pair");
                    // The visible twin sits one level behind the hidden leg.
                    if book.len() > 1 {
                        book[1].remove_order(matched.order_id);
                        if book[1].is_empty() {
                            book.remove(1);
                        }
                    }
                }
                if book[0].is_empty() {
                    book.remove(0);
                }
                (matched, is_ptc)
            } else {
                // Consume only part of the resting order; it keeps its queue
                // position.
                let Some((resting, meta)) = book[0].front_mut() else {
                    return ExecOutcome::NoMatch;
                };
                let mut matched = resting.clone();
                matched.quantity = order.quantity();
                resting.quantity -= order.quantity();

                let mut is_ptc = false;
                if resting.is_price_to_comply {
                    is_ptc = true;
                    debug_assert!(meta.ptc_hidden, "executed the visible half of a PTC pair");
                    let twin_id = resting.order_id;
                    let twin_quantity = resting.quantity;
                    if book.len() > 1 {
                        book[1].update_order_quantity(twin_id, twin_quantity);
                    }
                }
                (matched, is_ptc)
            }
        };

        // Matched limit orders execute at the price advertised in the book;
        // price improvement goes to the aggressor.
        let mut matched = matched;
        matched.fill_price = Some(matched.limit_price);

        if aggressor_is_bid {
            self.buy_transactions.push((now, matched.quantity));
        } else {
            self.sell_transactions.push((now, matched.quantity));
        }

        self.append_history(OrderStreamRecord {
            time: now,
            kind: BookRecordKind::Exec,
            order_id: matched.order_id,
            agent_id: matched.agent_id,
            oppos_order_id: Some(order.order_id()),
            oppos_agent_id: Some(order.agent_id()),
            // From the point of view of the passive order being executed.
            side: if aggressor_is_bid { Side::Ask } else { Side::Bid },
            quantity: matched.quantity,
            price: is_ptc_exec.then_some(matched.limit_price),
        });

        let mut filled = order.clone();
        filled.set_quantity(matched.quantity);
        filled.set_fill_price(matched.limit_price);
        order.set_quantity(order.quantity().saturating_sub(matched.quantity));

        debug!(new = %filled, old = %matched, "matched orders");
        self.outbound.push((
            matched.agent_id,
            Message::OrderExecuted {
                order: Order::Limit(matched.clone()),
            },
        ));
        self.outbound
            .push((filled.agent_id(), Message::OrderExecuted { order: filled }));

        self.last_update_ts = now;
        if self.book_logging {
            self.log_book_snapshot(now);
        }

        ExecOutcome::Matched(matched)
    }

    /// Add an order that found no (further) match to the book.
    fn enter_order(&mut self, order: LimitOrder, now: Timestamp, quiet: bool) {
        if order.is_price_to_comply {
            // Hidden leg rests at the true price; the visible twin is shown
            // one cent less aggressive. Both carry the same order id.
            let mut hidden = order.clone();
            let mut visible = order.clone();
            hidden.is_hidden = true;
            visible.limit_price += Price(if order.side.is_bid() { -1 } else { 1 });

            self.insert_order(hidden, OrderMeta { ptc_hidden: true });
            self.insert_order(visible, OrderMeta { ptc_hidden: false });
        } else {
            self.insert_order(order.clone(), OrderMeta::default());
        }

        self.last_update_ts = now;
        debug!(%order, "accepted new order");
        if !quiet {
            self.outbound
                .push((order.agent_id, Message::OrderAccepted { order }));
        }
    }

    /// Insert into the order's side, keeping levels sorted best-first.
    fn insert_order(&mut self, order: LimitOrder, meta: OrderMeta) {
        self.quotes_seen.insert(order.limit_price);
        let side = if order.side.is_bid() {
            &mut self.bids
        } else {
            &mut self.asks
        };

        let worse_than_all = side
            .last()
            .map(|level| level.order_has_worse_price(&order))
            .unwrap_or(true);
        if worse_than_all {
            side.push(PriceLevel::from_order(order, meta));
            return;
        }
        for i in 0..side.len() {
            if side[i].order_has_equal_price(&order) {
                side[i].add_order(order, meta);
                return;
            }
            if side[i].order_has_better_price(&order) {
                side.insert(i, PriceLevel::from_order(order, meta));
                return;
            }
        }
    }

    // =========================================================================
    // Order lifecycle
    // =========================================================================

    /// Cancel a resting order by id. Both legs of a price-to-comply pair are
    /// removed. Returns true if the order was found.
    pub fn cancel_order(&mut self, order: &LimitOrder, now: Timestamp, quiet: bool) -> bool {
        let Some((cancelled, _meta)) = self.take_order(order.side, order.order_id) else {
            return false;
        };
        if cancelled.is_price_to_comply {
            self.take_order(order.side, order.order_id);
        }

        self.append_history(OrderStreamRecord {
            time: now,
            kind: BookRecordKind::Cancel,
            order_id: cancelled.order_id,
            agent_id: cancelled.agent_id,
            oppos_order_id: None,
            oppos_agent_id: None,
            side: cancelled.side,
            quantity: cancelled.quantity,
            price: None,
        });
        self.last_update_ts = now;
        debug!(order = %cancelled, "cancelled order");
        if !quiet {
            self.outbound
                .push((cancelled.agent_id, Message::OrderCancelled { order: cancelled }));
        }
        true
    }

    /// Cancel `quantity` shares of a resting order, leaving the remainder in
    /// place with its priority intact. Returns true if the order was found
    /// and had more than `quantity` shares.
    pub fn partial_cancel_order(
        &mut self,
        order: &LimitOrder,
        quantity: Quantity,
        now: Timestamp,
    ) -> bool {
        let Some(live) = self.find_order(order.side, order.order_id).cloned() else {
            return false;
        };
        if quantity >= live.quantity {
            return false;
        }
        let new_quantity = live.quantity - quantity;
        self.update_quantity_both_legs(order.side, order.order_id, new_quantity, live.is_price_to_comply);

        let mut new_order = live.clone();
        new_order.quantity = new_quantity;

        self.append_history(OrderStreamRecord {
            time: now,
            kind: BookRecordKind::CancelPartial,
            order_id: live.order_id,
            agent_id: live.agent_id,
            oppos_order_id: None,
            oppos_agent_id: None,
            side: live.side,
            quantity,
            price: None,
        });
        self.last_update_ts = now;
        self.outbound.push((
            new_order.agent_id,
            Message::OrderPartialCancelled { new_order },
        ));
        true
    }

    /// Change the quantity of a resting order. A decrease keeps time
    /// priority; an increase forfeits it. Returns true if the order was
    /// found.
    pub fn modify_order(
        &mut self,
        order: &LimitOrder,
        new_order: LimitOrder,
        now: Timestamp,
        quiet: bool,
    ) -> bool {
        if order.order_id != new_order.order_id {
            return false;
        }
        let Some(live) = self.find_order(order.side, order.order_id).cloned() else {
            return false;
        };
        if !self.update_quantity_both_legs(
            order.side,
            order.order_id,
            new_order.quantity,
            live.is_price_to_comply,
        ) {
            return false;
        }

        self.append_history(OrderStreamRecord {
            time: now,
            kind: BookRecordKind::Modify,
            order_id: new_order.order_id,
            agent_id: new_order.agent_id,
            oppos_order_id: None,
            oppos_agent_id: None,
            side: new_order.side,
            quantity: new_order.quantity,
            price: None,
        });
        self.last_update_ts = now;
        if !quiet {
            self.outbound
                .push((new_order.agent_id, Message::OrderModified { new_order }));
        }
        true
    }

    /// Atomically cancel `order` and submit `new_order` in its place.
    /// Returns true if the original order was found and cancelled.
    pub fn replace_order(
        &mut self,
        agent_id: AgentId,
        order: &LimitOrder,
        new_order: LimitOrder,
        now: Timestamp,
    ) -> bool {
        if !self.cancel_order(order, now, true) {
            return false;
        }
        self.append_history(OrderStreamRecord {
            time: now,
            kind: BookRecordKind::Replace,
            order_id: order.order_id,
            agent_id,
            oppos_order_id: Some(new_order.order_id),
            oppos_agent_id: None,
            side: order.side,
            quantity: new_order.quantity,
            price: None,
        });
        if let Err(err) = self.handle_limit_order(new_order.clone(), now, true) {
            debug!(%err, "replacement order rejected");
        }
        self.outbound.push((
            agent_id,
            Message::OrderReplaced {
                old_order: order.clone(),
                new_order,
            },
        ));
        true
    }

    /// Remove an order (one leg) by id from the given side, dropping its
    /// level if that leaves it empty.
    fn take_order(&mut self, side: Side, order_id: OrderId) -> Option<(LimitOrder, OrderMeta)> {
        let levels = if side.is_bid() {
            &mut self.bids
        } else {
            &mut self.asks
        };
        for i in 0..levels.len() {
            if let Some(found) = levels[i].remove_order(order_id) {
                if levels[i].is_empty() {
                    levels.remove(i);
                }
                return Some(found);
            }
        }
        None
    }

    fn find_order(&self, side: Side, order_id: OrderId) -> Option<&LimitOrder> {
        let levels = if side.is_bid() { &self.bids } else { &self.asks };
        levels
            .iter()
            .find_map(|level| level.iter_orders().find(|o| o.order_id == order_id))
    }

    /// Apply a quantity update to an order and, for price-to-comply pairs,
    /// to its twin leg.
    fn update_quantity_both_legs(
        &mut self,
        side: Side,
        order_id: OrderId,
        new_quantity: Quantity,
        is_ptc: bool,
    ) -> bool {
        let levels = if side.is_bid() {
            &mut self.bids
        } else {
            &mut self.asks
        };
        let mut updated = false;
        for level in levels.iter_mut() {
            if level.update_order_quantity(order_id, new_quantity) {
                updated = true;
                if !is_ptc {
                    break;
                }
            }
        }
        updated
    }

    fn append_history(&mut self, record: OrderStreamRecord) {
        self.history.push_back(record);
        if let Some(limit) = self.history_limit {
            while self.history.len() > limit {
                self.history.pop_front();
            }
        }
    }

    fn log_book_snapshot(&mut self, now: Timestamp) {
        let record = BookSnapshotRecord {
            time: now,
            bids: self.get_l2_data(Side::Bid, self.book_log_depth),
            asks: self.get_l2_data(Side::Ask, self.book_log_depth),
        };
        self.book_log.push(record);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Best visible (price, quantity) on one side. Levels holding only
    /// hidden orders are not quoted.
    pub fn get_l1_data(&self, side: Side) -> Option<(Price, Quantity)> {
        let levels = if side.is_bid() { &self.bids } else { &self.asks };
        levels
            .iter()
            .find(|level| !level.total_quantity().is_zero())
            .map(|level| (level.price, level.total_quantity()))
    }

    /// Top `depth` visible (price, quantity) levels on one side.
    pub fn get_l2_data(&self, side: Side, depth: usize) -> Vec<(Price, Quantity)> {
        let levels = if side.is_bid() { &self.bids } else { &self.asks };
        levels
            .iter()
            .filter(|level| !level.total_quantity().is_zero())
            .take(depth)
            .map(|level| (level.price, level.total_quantity()))
            .collect()
    }

    /// Top `depth` levels with per-order visible sizes.
    pub fn get_l3_data(&self, side: Side, depth: usize) -> Vec<(Price, Vec<Quantity>)> {
        let levels = if side.is_bid() { &self.bids } else { &self.asks };
        levels
            .iter()
            .filter(|level| !level.total_quantity().is_zero())
            .take(depth)
            .map(|level| (level.price, level.visible_sizes()))
            .collect()
    }

    /// Transacted (buy-aggressor, sell-aggressor) volume over the trailing
    /// `lookback` window.
    pub fn get_transacted_volume(&self, lookback: Nanos, now: Timestamp) -> (Quantity, Quantity) {
        let window_start = now - lookback;
        let volume = |transactions: &[(Timestamp, Quantity)]| {
            transactions
                .iter()
                .rev()
                .take_while(|(t, _)| *t >= window_start)
                .map(|(_, q)| *q)
                .sum()
        };
        (volume(&self.buy_transactions), volume(&self.sell_transactions))
    }

    /// Book imbalance as `1 - lighter/heavier` over total visible volume,
    /// plus the heavier side. A balanced (or empty) book is `(0.0, None)`; a
    /// one-sided book is `(1.0, side)`.
    pub fn get_imbalance(&self) -> (f64, Option<Side>) {
        let bid_vol: u64 = self.bids.iter().map(|l| l.total_quantity().raw()).sum();
        let ask_vol: u64 = self.asks.iter().map(|l| l.total_quantity().raw()).sum();

        match (bid_vol, ask_vol) {
            (b, a) if b == a => (0.0, None),
            (0, _) => (1.0, Some(Side::Ask)),
            (_, 0) => (1.0, Some(Side::Bid)),
            (b, a) if b < a => (1.0 - b as f64 / a as f64, Some(Side::Ask)),
            (b, a) => (1.0 - a as f64 / b as f64, Some(Side::Bid)),
        }
    }

    /// The most recent `length` history records, newest first.
    pub fn get_order_stream(&self, length: usize) -> Vec<OrderStreamRecord> {
        self.history.iter().rev().take(length).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
