//! Order types: book side, limit and market orders.

use crate::ids::{AgentId, OrderId, Symbol};
use crate::money::{Price, Quantity};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Side
// =============================================================================

/// Which side of the book an order rests on or attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Returns the opposite side.
    pub fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    #[inline]
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Bid)
    }

    #[inline]
    pub fn is_ask(self) -> bool {
        matches!(self, Side::Ask)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

// =============================================================================
// Limit orders
// =============================================================================

/// A resting or incoming limit order.
///
/// `fill_price` is set only on executed copies returned by the matching
/// engine; a live order in the book never carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    /// Kernel-minted unique identifier.
    pub order_id: OrderId,
    /// Agent that placed the order.
    pub agent_id: AgentId,
    /// When the order was created.
    pub time_placed: Timestamp,
    /// Symbol being traded.
    pub symbol: Symbol,
    /// Remaining quantity; strictly positive while the order is live.
    pub quantity: Quantity,
    /// Buy or sell.
    pub side: Side,
    /// Limit price in cents.
    pub limit_price: Price,
    /// Hidden orders queue behind all visible orders at the same price.
    pub is_hidden: bool,
    /// Two-legged order: visible leg at a regulatory price, hidden leg at the
    /// true price. Both legs share this order's id.
    pub is_price_to_comply: bool,
    /// Insert into the level sorted by order id rather than at the back.
    pub insert_by_id: bool,
    /// Must never execute on entry; suppressed if it would cross.
    pub is_post_only: bool,
    /// Execution price of a filled copy.
    pub fill_price: Option<Price>,
    /// Free-form routing tag (e.g. order-replacement preprocessing markers).
    pub tag: Option<String>,
}

impl LimitOrder {
    /// Create a plain visible limit order.
    pub fn new(
        order_id: OrderId,
        agent_id: AgentId,
        time_placed: Timestamp,
        symbol: impl Into<Symbol>,
        quantity: Quantity,
        side: Side,
        limit_price: Price,
    ) -> Self {
        Self {
            order_id,
            agent_id,
            time_placed,
            symbol: symbol.into(),
            quantity,
            side,
            limit_price,
            is_hidden: false,
            is_price_to_comply: false,
            insert_by_id: false,
            is_post_only: false,
            fill_price: None,
            tag: None,
        }
    }

    /// Mark the order hidden.
    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    /// Mark the order price-to-comply.
    pub fn price_to_comply(mut self) -> Self {
        self.is_price_to_comply = true;
        self
    }

    /// Mark the order post-only.
    pub fn post_only(mut self) -> Self {
        self.is_post_only = true;
        self
    }

    /// Insert into its level sorted by order id.
    pub fn insert_by_id(mut self) -> Self {
        self.insert_by_id = true;
        self
    }

    /// Attach a routing tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl fmt::Display for LimitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ {}",
            self.order_id, self.symbol, self.side, self.quantity, self.limit_price
        )
    }
}

// =============================================================================
// Market orders
// =============================================================================

/// An incoming market order. Never enters the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub order_id: OrderId,
    pub agent_id: AgentId,
    pub time_placed: Timestamp,
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub side: Side,
    /// Execution price of a filled copy.
    pub fill_price: Option<Price>,
    /// Free-form routing tag.
    pub tag: Option<String>,
}

impl MarketOrder {
    pub fn new(
        order_id: OrderId,
        agent_id: AgentId,
        time_placed: Timestamp,
        symbol: impl Into<Symbol>,
        quantity: Quantity,
        side: Side,
    ) -> Self {
        Self {
            order_id,
            agent_id,
            time_placed,
            symbol: symbol.into(),
            quantity,
            side,
            fill_price: None,
            tag: None,
        }
    }
}

impl fmt::Display for MarketOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ MKT",
            self.order_id, self.symbol, self.side, self.quantity
        )
    }
}

// =============================================================================
// Order sum type
// =============================================================================

/// Either order kind, for code paths shared by the matching engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Limit(LimitOrder),
    Market(MarketOrder),
}

impl Order {
    pub fn order_id(&self) -> OrderId {
        match self {
            Order::Limit(o) => o.order_id,
            Order::Market(o) => o.order_id,
        }
    }

    pub fn agent_id(&self) -> AgentId {
        match self {
            Order::Limit(o) => o.agent_id,
            Order::Market(o) => o.agent_id,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Order::Limit(o) => &o.symbol,
            Order::Market(o) => &o.symbol,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Order::Limit(o) => o.side,
            Order::Market(o) => o.side,
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Order::Limit(o) => o.quantity,
            Order::Market(o) => o.quantity,
        }
    }

    pub fn set_quantity(&mut self, quantity: Quantity) {
        match self {
            Order::Limit(o) => o.quantity = quantity,
            Order::Market(o) => o.quantity = quantity,
        }
    }

    /// Limit price, if this is a limit order.
    pub fn limit_price(&self) -> Option<Price> {
        match self {
            Order::Limit(o) => Some(o.limit_price),
            Order::Market(_) => None,
        }
    }

    pub fn fill_price(&self) -> Option<Price> {
        match self {
            Order::Limit(o) => o.fill_price,
            Order::Market(o) => o.fill_price,
        }
    }

    pub fn set_fill_price(&mut self, price: Price) {
        match self {
            Order::Limit(o) => o.fill_price = Some(price),
            Order::Market(o) => o.fill_price = Some(price),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Order::Limit(o) => o.tag.as_deref(),
            Order::Market(o) => o.tag.as_deref(),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Limit(o) => o.fmt(f),
            Order::Market(o) => o.fmt(f),
        }
    }
}
