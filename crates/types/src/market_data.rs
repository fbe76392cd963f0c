//! Market-data subscription requests, data payloads, and book records.

use crate::ids::{AgentId, OrderId, Symbol};
use crate::money::{Price, Quantity};
use crate::order::Side;
use crate::time::{Nanos, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// Subscription requests
// =============================================================================

/// The kind of market-data subscription being created or cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketDataSub {
    /// Best bid/ask quote every `freq` nanoseconds.
    L1 { freq: Nanos },
    /// Top `depth` aggregated levels every `freq` nanoseconds.
    L2 { freq: Nanos, depth: usize },
    /// Top `depth` levels with per-order sizes every `freq` nanoseconds.
    L3 { freq: Nanos, depth: usize },
    /// Transacted volume over `lookback` every `freq` nanoseconds.
    TransactedVol { freq: Nanos, lookback: Nanos },
    /// Edge-triggered: fires when book imbalance crosses `min_imbalance`.
    ///
    /// 0.0 is a balanced book, 1.0 a one-sided book (liquidity drop).
    BookImbalance { min_imbalance: f64 },
}

/// Create (`cancel == false`) or cancel an existing market-data subscription
/// with the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataSubReq {
    pub symbol: Symbol,
    pub cancel: bool,
    pub kind: MarketDataSub,
}

// =============================================================================
// Data messages
// =============================================================================

/// Stage of an edge-triggered market-data event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    Finish,
}

/// Subscription payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketData {
    L1 {
        bid: Option<(Price, Quantity)>,
        ask: Option<(Price, Quantity)>,
    },
    L2 {
        bids: Vec<(Price, Quantity)>,
        asks: Vec<(Price, Quantity)>,
    },
    L3 {
        bids: Vec<(Price, Vec<Quantity>)>,
        asks: Vec<(Price, Vec<Quantity>)>,
    },
    TransactedVol {
        bid_volume: Quantity,
        ask_volume: Quantity,
    },
    BookImbalance {
        stage: Stage,
        imbalance: f64,
        side: Option<Side>,
    },
}

/// A market-data message sent to a subscribed agent.
///
/// `last_transaction` and `exchange_ts` are bookkeeping fields unrelated to
/// the subscription payload itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataMsg {
    pub symbol: Symbol,
    /// Price of the last trade on the exchange, if any.
    pub last_transaction: Option<Price>,
    /// Time the message was sent from the exchange.
    pub exchange_ts: Timestamp,
    pub data: MarketData,
}

// =============================================================================
// Book records
// =============================================================================

/// What happened to a resting order, as recorded in the book history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookRecordKind {
    Exec,
    Cancel,
    CancelPartial,
    Modify,
    Replace,
}

/// One row of the order-stream history served by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStreamRecord {
    pub time: Timestamp,
    pub kind: BookRecordKind,
    pub order_id: OrderId,
    pub agent_id: AgentId,
    /// Aggressor order for executions.
    pub oppos_order_id: Option<OrderId>,
    pub oppos_agent_id: Option<AgentId>,
    /// Side of the resting order the record describes.
    pub side: Side,
    pub quantity: Quantity,
    /// Execution price, recorded only for price-to-comply executions.
    pub price: Option<Price>,
}

/// Depth snapshot appended to the book log after each execution when book
/// logging is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshotRecord {
    pub time: Timestamp,
    pub bids: Vec<(Price, Quantity)>,
    pub asks: Vec<(Price, Quantity)>,
}
