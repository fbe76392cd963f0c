//! The message taxonomy exchanged between agents.
//!
//! Every inter-agent communication is one variant of [`Message`]. Dispatch is
//! an exhaustive `match`, so a handler that forgets a variant fails to
//! compile rather than at runtime.

use crate::ids::Symbol;
use crate::market_data::{MarketDataMsg, MarketDataSubReq, OrderStreamRecord};
use crate::money::{Price, Quantity};
use crate::order::{LimitOrder, MarketOrder, Order};
use crate::time::{Nanos, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A message delivered to an agent by the kernel.
///
/// Requests flow from trading agents to the exchange; responses and book
/// notifications flow back. `Wakeup` is the kernel's own timer callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Timer callback requested via `set_wakeup`.
    Wakeup,

    // ── Market hours ─────────────────────────────────────────────────────
    /// Ask the exchange for its operating hours.
    MarketHoursRequest,
    MarketHours {
        mkt_open: Timestamp,
        mkt_close: Timestamp,
    },

    // ── Close price ──────────────────────────────────────────────────────
    /// Ask to be sent closing prices when the market closes.
    MarketClosePriceRequest,
    MarketClosePrice {
        close_prices: BTreeMap<Symbol, Price>,
    },

    /// The request could not be served because the market has closed.
    MarketClosed,

    // ── Queries ──────────────────────────────────────────────────────────
    QueryLastTrade {
        symbol: Symbol,
    },
    QueryLastTradeResponse {
        symbol: Symbol,
        mkt_closed: bool,
        last_trade: Option<Price>,
    },
    QuerySpread {
        symbol: Symbol,
        depth: usize,
    },
    QuerySpreadResponse {
        symbol: Symbol,
        mkt_closed: bool,
        depth: usize,
        bids: Vec<(Price, Quantity)>,
        asks: Vec<(Price, Quantity)>,
        last_trade: Option<Price>,
    },
    QueryOrderStream {
        symbol: Symbol,
        length: usize,
    },
    QueryOrderStreamResponse {
        symbol: Symbol,
        mkt_closed: bool,
        length: usize,
        orders: Vec<OrderStreamRecord>,
    },
    QueryTransactedVol {
        symbol: Symbol,
        lookback: Nanos,
    },
    QueryTransactedVolResponse {
        symbol: Symbol,
        mkt_closed: bool,
        bid_volume: Quantity,
        ask_volume: Quantity,
    },

    // ── Market data subscriptions ────────────────────────────────────────
    MarketDataSubReq(MarketDataSubReq),
    MarketData(MarketDataMsg),

    // ── Order entry and lifecycle requests ───────────────────────────────
    LimitOrder(LimitOrder),
    MarketOrder(MarketOrder),
    CancelOrder {
        order: LimitOrder,
    },
    /// Cancel `quantity` shares of a resting order.
    PartialCancelOrder {
        order: LimitOrder,
        quantity: Quantity,
    },
    /// Change the quantity of a resting order in place.
    ModifyOrder {
        order: LimitOrder,
        new_order: LimitOrder,
    },
    /// Atomically cancel a resting order and submit a replacement.
    ReplaceOrder {
        order: LimitOrder,
        new_order: LimitOrder,
    },

    // ── Book notifications ───────────────────────────────────────────────
    OrderAccepted {
        order: LimitOrder,
    },
    OrderExecuted {
        order: Order,
    },
    OrderCancelled {
        order: LimitOrder,
    },
    OrderPartialCancelled {
        new_order: LimitOrder,
    },
    OrderModified {
        new_order: LimitOrder,
    },
    OrderReplaced {
        old_order: LimitOrder,
        new_order: LimitOrder,
    },
}

impl Message {
    /// Short variant name for logs and traces.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Wakeup => "Wakeup",
            Message::MarketHoursRequest => "MarketHoursRequest",
            Message::MarketHours { .. } => "MarketHours",
            Message::MarketClosePriceRequest => "MarketClosePriceRequest",
            Message::MarketClosePrice { .. } => "MarketClosePrice",
            Message::MarketClosed => "MarketClosed",
            Message::QueryLastTrade { .. } => "QueryLastTrade",
            Message::QueryLastTradeResponse { .. } => "QueryLastTradeResponse",
            Message::QuerySpread { .. } => "QuerySpread",
            Message::QuerySpreadResponse { .. } => "QuerySpreadResponse",
            Message::QueryOrderStream { .. } => "QueryOrderStream",
            Message::QueryOrderStreamResponse { .. } => "QueryOrderStreamResponse",
            Message::QueryTransactedVol { .. } => "QueryTransactedVol",
            Message::QueryTransactedVolResponse { .. } => "QueryTransactedVolResponse",
            Message::MarketDataSubReq(_) => "MarketDataSubReq",
            Message::MarketData(_) => "MarketData",
            Message::LimitOrder(_) => "LimitOrder",
            Message::MarketOrder(_) => "MarketOrder",
            Message::CancelOrder { .. } => "CancelOrder",
            Message::PartialCancelOrder { .. } => "PartialCancelOrder",
            Message::ModifyOrder { .. } => "ModifyOrder",
            Message::ReplaceOrder { .. } => "ReplaceOrder",
            Message::OrderAccepted { .. } => "OrderAccepted",
            Message::OrderExecuted { .. } => "OrderExecuted",
            Message::OrderCancelled { .. } => "OrderCancelled",
            Message::OrderPartialCancelled { .. } => "OrderPartialCancelled",
            Message::OrderModified { .. } => "OrderModified",
            Message::OrderReplaced { .. } => "OrderReplaced",
        }
    }

    /// True for order entry and lifecycle requests, which the exchange
    /// answers with an additional pipeline delay.
    pub fn is_order_activity(&self) -> bool {
        matches!(
            self,
            Message::LimitOrder(_)
                | Message::MarketOrder(_)
                | Message::CancelOrder { .. }
                | Message::PartialCancelOrder { .. }
                | Message::ModifyOrder { .. }
                | Message::ReplaceOrder { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AgentId, OrderId};
    use crate::order::Side;

    #[test]
    fn test_kind_names() {
        assert_eq!(Message::Wakeup.kind(), "Wakeup");
        assert_eq!(Message::MarketClosed.kind(), "MarketClosed");
        assert_eq!(
            Message::QuerySpread {
                symbol: "AAPL".to_string(),
                depth: 1
            }
            .kind(),
            "QuerySpread"
        );
    }

    #[test]
    fn test_order_activity_classification() {
        let order = LimitOrder::new(
            OrderId(1),
            AgentId(1),
            Timestamp(0),
            "AAPL",
            Quantity(10),
            Side::Bid,
            Price(10_000),
        );

        assert!(Message::LimitOrder(order.clone()).is_order_activity());
        assert!(Message::CancelOrder { order }.is_order_activity());
        assert!(!Message::MarketHoursRequest.is_order_activity());
        assert!(!Message::Wakeup.is_order_activity());
    }
}
