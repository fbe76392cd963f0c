//! A single price level: the FIFO queues of orders resting at one
//! (price, side).
//!
//! Visible orders are consumed first, followed by any hidden orders; within
//! each queue, first-in first-out. This type hides the visible/hidden split
//! from the parent order book.

use std::collections::VecDeque;
use types::{LimitOrder, OrderId, Price, Quantity, Side};

/// Per-order bookkeeping attached alongside each resting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderMeta {
    /// True on the hidden leg of a price-to-comply pair. Execution must only
    /// ever happen on the hidden leg; the visible twin (same order id, one
    /// cent less aggressive) is mirrored by the book.
    pub ptc_hidden: bool,
}

/// All orders resting at a single price on one side of the book.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
    /// Price shared by every order in the level.
    pub price: Price,
    /// Side shared by every order in the level.
    pub side: Side,
    visible: VecDeque<(LimitOrder, OrderMeta)>,
    hidden: VecDeque<(LimitOrder, OrderMeta)>,
}

impl PriceLevel {
    /// Create a level from its first order; the level's price and side are
    /// fixed to that order's.
    pub fn from_order(order: LimitOrder, meta: OrderMeta) -> Self {
        let mut level = Self {
            price: order.limit_price,
            side: order.side,
            visible: VecDeque::new(),
            hidden: VecDeque::new(),
        };
        level.add_order(order, meta);
        level
    }

    /// Add an order to the correct queue.
    ///
    /// Hidden orders go to the back of the hidden queue. `insert_by_id`
    /// orders are placed so the visible queue stays sorted by order id;
    /// everything else appends to the visible queue.
    pub fn add_order(&mut self, order: LimitOrder, meta: OrderMeta) {
        if order.is_hidden {
            self.hidden.push_back((order, meta));
        } else if order.insert_by_id {
            let at = self
                .visible
                .iter()
                .position(|(o, _)| o.order_id > order.order_id)
                .unwrap_or(self.visible.len());
            self.visible.insert(at, (order, meta));
        } else {
            self.visible.push_back((order, meta));
        }
    }

    /// Update the quantity of a resting order.
    ///
    /// A decrease keeps the order's queue position; an increase moves it to
    /// the back of its queue. Returns false if `new_quantity` is zero or no
    /// order with the given id exists (use [`Self::remove_order`] to delete).
    pub fn update_order_quantity(&mut self, order_id: OrderId, new_quantity: Quantity) -> bool {
        if new_quantity.is_zero() {
            return false;
        }

        for queue in [&mut self.visible, &mut self.hidden] {
            if let Some(at) = queue.iter().position(|(o, _)| o.order_id == order_id) {
                if new_quantity <= queue[at].0.quantity {
                    queue[at].0.quantity = new_quantity;
                } else if let Some((mut order, meta)) = queue.remove(at) {
                    order.quantity = new_quantity;
                    queue.push_back((order, meta));
                }
                return true;
            }
        }
        false
    }

    /// Remove an order by id, returning it if found.
    pub fn remove_order(&mut self, order_id: OrderId) -> Option<(LimitOrder, OrderMeta)> {
        for queue in [&mut self.visible, &mut self.hidden] {
            if let Some(at) = queue.iter().position(|(o, _)| o.order_id == order_id) {
                return queue.remove(at);
            }
        }
        None
    }

    /// The highest-priority order: front of visible, else front of hidden.
    pub fn front(&self) -> Option<&(LimitOrder, OrderMeta)> {
        self.visible.front().or_else(|| self.hidden.front())
    }

    /// Mutable access to the highest-priority order.
    pub fn front_mut(&mut self) -> Option<&mut (LimitOrder, OrderMeta)> {
        if !self.visible.is_empty() {
            self.visible.front_mut()
        } else {
            self.hidden.front_mut()
        }
    }

    /// Remove and return the highest-priority order.
    pub fn pop(&mut self) -> Option<(LimitOrder, OrderMeta)> {
        self.visible.pop_front().or_else(|| self.hidden.pop_front())
    }

    /// Would an order from the opposite side execute against this level?
    ///
    /// A bid matches when its limit is at or above the level price; an ask
    /// when its limit is at or below. A post-only aggressor never matches a
    /// level whose visible quantity is zero.
    pub fn order_is_match(&self, order: &LimitOrder) -> bool {
        debug_assert_eq!(order.side, self.side.opposite(), "order on wrong side of book");

        if order.is_post_only && self.total_quantity().is_zero() {
            return false;
        }
        match order.side {
            Side::Bid => order.limit_price >= self.price,
            Side::Ask => order.limit_price <= self.price,
        }
    }

    /// Does a same-side order price better than this level?
    pub fn order_has_better_price(&self, order: &LimitOrder) -> bool {
        debug_assert_eq!(order.side, self.side, "order on wrong side of book");
        match order.side {
            Side::Bid => order.limit_price > self.price,
            Side::Ask => order.limit_price < self.price,
        }
    }

    /// Does a same-side order price worse than this level?
    pub fn order_has_worse_price(&self, order: &LimitOrder) -> bool {
        debug_assert_eq!(order.side, self.side, "order on wrong side of book");
        match order.side {
            Side::Bid => order.limit_price < self.price,
            Side::Ask => order.limit_price > self.price,
        }
    }

    /// Does a same-side order price equal to this level?
    pub fn order_has_equal_price(&self, order: &LimitOrder) -> bool {
        debug_assert_eq!(order.side, self.side, "order on wrong side of book");
        order.limit_price == self.price
    }

    /// Total visible quantity. Hidden orders are excluded by definition.
    pub fn total_quantity(&self) -> Quantity {
        self.visible.iter().map(|(o, _)| o.quantity).sum()
    }

    /// Per-order visible sizes in queue order, for L3 data.
    pub fn visible_sizes(&self) -> Vec<Quantity> {
        self.visible.iter().map(|(o, _)| o.quantity).collect()
    }

    /// Iterate every order in the level, visible first.
    pub fn iter_orders(&self) -> impl Iterator<Item = &LimitOrder> {
        self.visible.iter().chain(self.hidden.iter()).map(|(o, _)| o)
    }

    /// True when both queues are empty; such a level must be removed from
    /// the book.
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.hidden.is_empty()
    }
}
