//! Core types for the market simulation.
//!
//! This crate provides all shared data types used across the simulator:
//! nanosecond timestamps, identifier newtypes, fixed-point monetary values,
//! order types, and the message taxonomy exchanged between agents.

mod ids;
mod market_data;
mod messages;
mod money;
mod order;
mod time;

pub use ids::{AgentId, OrderId, Symbol, CASH_SYMBOL};
pub use market_data::{
    BookRecordKind, BookSnapshotRecord, MarketData, MarketDataMsg, MarketDataSub,
    MarketDataSubReq, OrderStreamRecord, Stage,
};
pub use messages::Message;
pub use money::{Cash, Price, Quantity, CENTS_PER_DOLLAR};
pub use order::{LimitOrder, MarketOrder, Order, Side};
pub use time::{Nanos, Timestamp};
