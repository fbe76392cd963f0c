//! Shared bookkeeping for trading agents.
//!
//! Strategy agents embed a [`TradingAgentState`] rather than duplicating the
//! messaging and position-tracking boilerplate: market-hours discovery,
//! holdings and open-order maintenance, quote caching, risk-checked order
//! creation, and mark-to-market valuation.

use std::collections::BTreeMap;
use tracing::{debug, warn};
use types::{
    AgentId, Cash, LimitOrder, MarketDataSubReq, MarketOrder, Message, Nanos, OrderId, Price,
    Quantity, Side, Symbol, Timestamp, CASH_SYMBOL,
};

use crate::error::KernelError;
use crate::exchange::EXCHANGE_KIND;
use crate::traits::KernelApi;

/// A cached answer to a spread query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quote {
    /// Bid levels, best first.
    pub bids: Vec<(Price, Quantity)>,
    /// Ask levels, best first.
    pub asks: Vec<(Price, Quantity)>,
}

impl Quote {
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks.first().copied()
    }

    /// Midpoint of the best quotes, when both sides exist.
    pub fn midpoint(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(Price((bid.raw() + ask.raw()) / 2)),
            _ => None,
        }
    }
}

/// Reusable state record for trading agents.
///
/// Agents are limited by their starting cash, without leverage: an order
/// whose post-state increases at-risk capital beyond the starting cash is
/// refused unless the strategy opts out of the check.
#[derive(Debug, Clone)]
pub struct TradingAgentState {
    starting_cash: Cash,
    /// Shares held per symbol; `CASH` is a special symbol in cents.
    pub holdings: BTreeMap<Symbol, i64>,
    /// Open (not cancelled, not fully executed) orders by id.
    pub orders: BTreeMap<OrderId, LimitOrder>,
    /// Last known trade price per symbol.
    pub last_trade: BTreeMap<Symbol, Price>,
    /// Close price recorded from post-close responses.
    pub daily_close_price: BTreeMap<Symbol, Price>,
    /// Timestamped spread snapshots per symbol, newest last.
    pub known_quotes: BTreeMap<Symbol, BTreeMap<Timestamp, Quote>>,
    /// Last transacted-volume answer per symbol (bid volume, ask volume).
    pub transacted_volume: BTreeMap<Symbol, (Quantity, Quantity)>,
    /// Exchange discovered at kernel start.
    pub exchange_id: Option<AgentId>,
    pub mkt_open: Timestamp,
    pub mkt_close: Timestamp,
    /// Whether we have observed the market close.
    pub mkt_closed: bool,
    first_wake: bool,
    /// ETF creation/redemption adjustment carried into mark-to-market.
    pub nav_diff: i64,
    pub basket_size: i64,
    log_orders: bool,
}

impl TradingAgentState {
    pub fn new(starting_cash: Cash) -> Self {
        let mut holdings = BTreeMap::new();
        holdings.insert(CASH_SYMBOL.to_string(), starting_cash.raw());
        Self {
            starting_cash,
            holdings,
            orders: BTreeMap::new(),
            last_trade: BTreeMap::new(),
            daily_close_price: BTreeMap::new(),
            known_quotes: BTreeMap::new(),
            transacted_volume: BTreeMap::new(),
            exchange_id: None,
            mkt_open: Timestamp::INVALID,
            mkt_close: Timestamp::INVALID,
            mkt_closed: false,
            first_wake: true,
            nav_diff: 0,
            basket_size: 0,
            log_orders: false,
        }
    }

    /// Log every order submission and execution to the event log.
    pub fn with_order_logging(mut self) -> Self {
        self.log_orders = true;
        self
    }

    pub fn starting_cash(&self) -> Cash {
        self.starting_cash
    }

    /// Cash on hand, in cents.
    pub fn cash(&self) -> Cash {
        Cash(self.holdings.get(CASH_SYMBOL).copied().unwrap_or(0))
    }

    /// Shares held of one symbol.
    pub fn get_holdings(&self, symbol: &str) -> i64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    /// Market hours are known and the close has not yet been observed.
    pub fn is_ready_to_trade(&self) -> bool {
        self.mkt_open.is_valid() && self.mkt_close.is_valid() && !self.mkt_closed
    }

    // =========================================================================
    // Lifecycle plumbing
    // =========================================================================

    /// Discover the exchange and schedule the first wakeup.
    pub fn kernel_starting(
        &mut self,
        id: AgentId,
        start_time: Timestamp,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError> {
        kernel.log_event(id, "STARTING_CASH", &self.starting_cash.to_string());

        self.exchange_id = kernel.find_agent_by_kind(EXCHANGE_KIND);
        if self.exchange_id.is_none() {
            warn!(agent = %id, "no exchange agent found in simulation");
        }
        kernel.set_wakeup(id, start_time)
    }

    /// Common wakeup bookkeeping. Returns whether the agent is ready to
    /// trade: market hours known and the market not yet closed.
    pub fn wakeup(
        &mut self,
        id: AgentId,
        _now: Timestamp,
        kernel: &mut dyn KernelApi,
    ) -> Result<bool, KernelError> {
        if let Some(exchange) = self.exchange_id {
            if self.first_wake {
                self.first_wake = false;
                kernel.log_event(id, "HOLDINGS_UPDATED", &self.fmt_holdings());
                kernel.send_message(id, exchange, Message::MarketClosePriceRequest, 0);
            }
            if !self.mkt_open.is_valid() {
                kernel.send_message(id, exchange, Message::MarketHoursRequest, 0);
            }
        }
        Ok(self.is_ready_to_trade())
    }

    /// Absorb the messages every trading agent understands. Strategy
    /// handlers run after this and react to what remains.
    pub fn receive_message(
        &mut self,
        id: AgentId,
        now: Timestamp,
        message: &Message,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError> {
        let had_mkt_hours = self.mkt_open.is_valid() && self.mkt_close.is_valid();

        match message {
            Message::MarketHours {
                mkt_open,
                mkt_close,
            } => {
                self.mkt_open = *mkt_open;
                self.mkt_close = *mkt_close;
                debug!(agent = %id, open = %self.mkt_open, close = %self.mkt_close, "recorded market hours");

                // Schedule the market-open wakeup once hours become known.
                if !had_mkt_hours && self.mkt_open > now {
                    kernel.set_wakeup(id, self.mkt_open)?;
                }
            }

            Message::MarketClosed => {
                self.mkt_closed = true;
            }

            Message::MarketClosePrice { close_prices } => {
                for (symbol, price) in close_prices {
                    self.last_trade.insert(symbol.clone(), *price);
                    self.daily_close_price.insert(symbol.clone(), *price);
                }
            }

            Message::QueryLastTradeResponse {
                symbol,
                mkt_closed,
                last_trade,
            } => {
                if *mkt_closed {
                    self.mkt_closed = true;
                }
                if let Some(price) = last_trade {
                    self.last_trade.insert(symbol.clone(), *price);
                    if *mkt_closed {
                        self.daily_close_price.insert(symbol.clone(), *price);
                    }
                }
            }

            Message::QuerySpreadResponse {
                symbol,
                mkt_closed,
                bids,
                asks,
                last_trade,
                ..
            } => {
                if *mkt_closed {
                    self.mkt_closed = true;
                }
                if let Some(price) = last_trade {
                    self.last_trade.insert(symbol.clone(), *price);
                    if *mkt_closed {
                        self.daily_close_price.insert(symbol.clone(), *price);
                    }
                }
                self.known_quotes.entry(symbol.clone()).or_default().insert(
                    now,
                    Quote {
                        bids: bids.clone(),
                        asks: asks.clone(),
                    },
                );
            }

            Message::QueryTransactedVolResponse {
                symbol,
                mkt_closed,
                bid_volume,
                ask_volume,
            } => {
                if *mkt_closed {
                    self.mkt_closed = true;
                }
                self.transacted_volume
                    .insert(symbol.clone(), (*bid_volume, *ask_volume));
            }

            Message::OrderAccepted { order } => {
                if self.log_orders {
                    kernel.log_event(id, "ORDER_ACCEPTED", &order.to_string());
                }
            }

            Message::OrderExecuted { order } => {
                self.apply_execution(id, order.side(), order.symbol(), order.quantity(), order.fill_price());
                let executed = order.quantity();
                let fully_filled = self
                    .orders
                    .get(&order.order_id())
                    .is_some_and(|open| executed >= open.quantity);
                if fully_filled {
                    self.orders.remove(&order.order_id());
                } else if let Some(open) = self.orders.get_mut(&order.order_id()) {
                    open.quantity -= executed;
                }
                if self.log_orders {
                    kernel.log_event(id, "ORDER_EXECUTED", &order.to_string());
                }
            }

            Message::OrderCancelled { order } => {
                self.orders.remove(&order.order_id);
            }

            Message::OrderPartialCancelled { new_order } | Message::OrderModified { new_order } => {
                self.orders.insert(new_order.order_id, new_order.clone());
            }

            Message::OrderReplaced {
                old_order,
                new_order,
            } => {
                self.orders.remove(&old_order.order_id);
                self.orders.insert(new_order.order_id, new_order.clone());
            }

            _ => {}
        }
        Ok(())
    }

    fn apply_execution(
        &mut self,
        id: AgentId,
        side: Side,
        symbol: &str,
        quantity: Quantity,
        fill_price: Option<Price>,
    ) {
        let Some(price) = fill_price else {
            warn!(agent = %id, %symbol, "execution notification without a fill price");
            return;
        };
        let shares = quantity.raw() as i64;
        let notional = price.raw() * shares;

        let held = self.holdings.entry(symbol.to_string()).or_insert(0);
        let cash = match side {
            Side::Bid => {
                *held += shares;
                -notional
            }
            Side::Ask => {
                *held -= shares;
                notional
            }
        };
        if *held == 0 {
            self.holdings.remove(symbol);
        }
        *self
            .holdings
            .entry(CASH_SYMBOL.to_string())
            .or_insert(0) += cash;
    }

    /// End-of-run valuation and reporting.
    pub fn kernel_stopping(&mut self, id: AgentId, kind: &str, kernel: &mut dyn KernelApi) {
        kernel.log_event(id, "FINAL_HOLDINGS", &self.fmt_holdings());
        kernel.log_event(id, "FINAL_CASH_POSITION", &self.cash().to_string());

        let cash = self.mark_to_market(&self.holdings, false);
        kernel.log_event(id, "ENDING_CASH", &cash.to_string());

        kernel.record_agent_result(kind, cash - self.starting_cash);
    }

    // =========================================================================
    // Order placement
    // =========================================================================

    /// Build a risk-checked limit order.
    ///
    /// With `ignore_risk` unset, the order is refused when the post-trade
    /// at-risk capital both worsens and exceeds the starting cash. Returns
    /// `None` for refused or zero-quantity orders.
    #[allow(clippy::too_many_arguments)]
    pub fn create_limit_order(
        &mut self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        symbol: &str,
        quantity: Quantity,
        side: Side,
        limit_price: Price,
        ignore_risk: bool,
    ) -> Option<LimitOrder> {
        if quantity.is_zero() {
            debug!(agent = %id, %symbol, "ignored limit order of zero quantity");
            return None;
        }

        let order = LimitOrder::new(
            kernel.next_order_id(),
            id,
            kernel.now(),
            symbol,
            quantity,
            side,
            limit_price,
        );

        if !ignore_risk {
            let mut new_holdings = self.holdings.clone();
            let signed = match side {
                Side::Bid => quantity.raw() as i64,
                Side::Ask => -(quantity.raw() as i64),
            };
            *new_holdings.entry(symbol.to_string()).or_insert(0) += signed;

            // Always allow reducing risk; otherwise stay within starting cash.
            let at_risk = self.mark_to_market(&self.holdings, false) - self.cash();
            let new_at_risk = self.mark_to_market(&new_holdings, false) - self.cash();
            if new_at_risk > at_risk && new_at_risk > self.starting_cash {
                debug!(agent = %id, %order, "ignored limit order due to at-risk constraints");
                return None;
            }
        }

        Some(order)
    }

    /// Track and submit an already-built limit order to the exchange.
    pub fn submit_limit_order(
        &mut self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        order: LimitOrder,
    ) {
        let Some(exchange) = self.exchange_id else {
            warn!(agent = %id, "cannot place order without an exchange");
            return;
        };
        self.orders.insert(order.order_id, order.clone());
        if self.log_orders {
            kernel.log_event(id, "ORDER_SUBMITTED", &order.to_string());
        }
        kernel.send_message(id, exchange, Message::LimitOrder(order), 0);
    }

    /// Create and submit a plain limit order.
    #[allow(clippy::too_many_arguments)]
    pub fn place_limit_order(
        &mut self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        symbol: &str,
        quantity: Quantity,
        side: Side,
        limit_price: Price,
        ignore_risk: bool,
    ) {
        if let Some(order) =
            self.create_limit_order(id, kernel, symbol, quantity, side, limit_price, ignore_risk)
        {
            self.submit_limit_order(id, kernel, order);
        }
    }

    /// Submit a market order. Market orders are not tracked in `orders`.
    pub fn place_market_order(
        &mut self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        symbol: &str,
        quantity: Quantity,
        side: Side,
    ) {
        let Some(exchange) = self.exchange_id else {
            warn!(agent = %id, "cannot place order without an exchange");
            return;
        };
        let order = MarketOrder::new(kernel.next_order_id(), id, kernel.now(), symbol, quantity, side);
        if self.log_orders {
            kernel.log_event(id, "ORDER_SUBMITTED", &order.to_string());
        }
        kernel.send_message(id, exchange, Message::MarketOrder(order), 0);
    }

    /// Request cancellation of one open order.
    pub fn cancel_order(&mut self, id: AgentId, kernel: &mut dyn KernelApi, order_id: OrderId) {
        let (Some(exchange), Some(order)) = (self.exchange_id, self.orders.get(&order_id)) else {
            return;
        };
        kernel.send_message(
            id,
            exchange,
            Message::CancelOrder {
                order: order.clone(),
            },
            0,
        );
    }

    /// Request cancellation of every open order.
    pub fn cancel_all_orders(&mut self, id: AgentId, kernel: &mut dyn KernelApi) {
        let ids: Vec<OrderId> = self.orders.keys().copied().collect();
        for order_id in ids {
            self.cancel_order(id, kernel, order_id);
        }
    }

    // =========================================================================
    // Queries and subscriptions
    // =========================================================================

    /// Ask the exchange for the current spread at the given depth.
    pub fn get_current_spread(
        &self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        symbol: &str,
        depth: usize,
    ) {
        if let Some(exchange) = self.exchange_id {
            kernel.send_message(
                id,
                exchange,
                Message::QuerySpread {
                    symbol: symbol.to_string(),
                    depth,
                },
                0,
            );
        }
    }

    /// Ask the exchange for the last trade price.
    pub fn get_last_trade(&self, id: AgentId, kernel: &mut dyn KernelApi, symbol: &str) {
        if let Some(exchange) = self.exchange_id {
            kernel.send_message(
                id,
                exchange,
                Message::QueryLastTrade {
                    symbol: symbol.to_string(),
                },
                0,
            );
        }
    }

    /// Ask the exchange for transacted volume over a trailing window.
    pub fn get_transacted_volume(
        &self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        symbol: &str,
        lookback: Nanos,
    ) {
        if let Some(exchange) = self.exchange_id {
            kernel.send_message(
                id,
                exchange,
                Message::QueryTransactedVol {
                    symbol: symbol.to_string(),
                    lookback,
                },
                0,
            );
        }
    }

    /// Create a market-data subscription with the exchange.
    pub fn request_data_subscription(
        &self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        mut request: MarketDataSubReq,
    ) {
        if let Some(exchange) = self.exchange_id {
            request.cancel = false;
            kernel.send_message(id, exchange, Message::MarketDataSubReq(request), 0);
        }
    }

    /// Cancel an existing market-data subscription.
    pub fn cancel_data_subscription(
        &self,
        id: AgentId,
        kernel: &mut dyn KernelApi,
        mut request: MarketDataSubReq,
    ) {
        if let Some(exchange) = self.exchange_id {
            request.cancel = true;
            kernel.send_message(id, exchange, Message::MarketDataSubReq(request), 0);
        }
    }

    /// The most recent quote snapshot for a symbol.
    pub fn known_bid_ask(&self, symbol: &str) -> Option<&Quote> {
        self.known_quotes
            .get(symbol)
            .and_then(|by_time| by_time.values().next_back())
    }

    /// Midpoint of the most recent quote, when both sides were present.
    pub fn known_midpoint(&self, symbol: &str) -> Option<Price> {
        self.known_bid_ask(symbol).and_then(Quote::midpoint)
    }

    // =========================================================================
    // Valuation
    // =========================================================================

    /// Value a holdings map in cents: cash plus basket adjustment plus each
    /// position at the midpoint (when requested and known) or last trade.
    pub fn mark_to_market(&self, holdings: &BTreeMap<Symbol, i64>, use_midpoint: bool) -> Cash {
        let mut cash = Cash(holdings.get(CASH_SYMBOL).copied().unwrap_or(0));
        cash += Cash(self.basket_size * self.nav_diff);

        for (symbol, shares) in holdings {
            if symbol == CASH_SYMBOL {
                continue;
            }
            let price = use_midpoint
                .then(|| self.known_midpoint(symbol))
                .flatten()
                .or_else(|| self.last_trade.get(symbol).copied());
            match price {
                Some(price) => cash += Cash(price.raw() * shares),
                None => warn!(%symbol, "no price information to mark holdings to market"),
            }
        }
        cash
    }

    /// Render holdings with CASH last, for event logs.
    pub fn fmt_holdings(&self) -> String {
        let mut parts: Vec<String> = self
            .holdings
            .iter()
            .filter(|(symbol, _)| symbol.as_str() != CASH_SYMBOL)
            .map(|(symbol, shares)| format!("{}: {}", symbol, shares))
            .collect();
        parts.push(format!("CASH: {}", self.cash().raw()));
        format!("{{ {} }}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockKernel;
    use types::Order;

    const EXCHANGE: AgentId = AgentId(0);
    const ME: AgentId = AgentId(1);

    fn state_and_kernel() -> (TradingAgentState, MockKernel) {
        let state = TradingAgentState::new(Cash::from_float(100_000.0));
        let kernel = MockKernel::new(Timestamp(100)).with_agent(EXCHANGE_KIND, EXCHANGE);
        (state, kernel)
    }

    fn ready_state() -> (TradingAgentState, MockKernel) {
        let (mut state, kernel) = state_and_kernel();
        state.exchange_id = Some(EXCHANGE);
        state.mkt_open = Timestamp(0);
        state.mkt_close = Timestamp(1_000_000_000);
        (state, kernel)
    }

    #[test]
    fn test_kernel_starting_discovers_exchange() {
        let (mut state, mut kernel) = state_and_kernel();
        kernel.now = Timestamp::INVALID;

        state.kernel_starting(ME, Timestamp(0), &mut kernel).unwrap();

        assert_eq!(state.exchange_id, Some(EXCHANGE));
        assert_eq!(kernel.wakeups, vec![(ME, Timestamp(0))]);
        assert!(kernel.events.iter().any(|(_, kind, _)| kind == "STARTING_CASH"));
    }

    #[test]
    fn test_first_wake_requests_hours_and_close_price() {
        let (mut state, mut kernel) = state_and_kernel();
        state.exchange_id = Some(EXCHANGE);

        let ready = state.wakeup(ME, Timestamp(100), &mut kernel).unwrap();
        assert!(!ready);

        let sent = kernel.sent_to(EXCHANGE);
        assert!(matches!(sent[0], Message::MarketClosePriceRequest));
        assert!(matches!(sent[1], Message::MarketHoursRequest));

        // Second wake only re-requests hours.
        kernel.sent.clear();
        state.wakeup(ME, Timestamp(200), &mut kernel).unwrap();
        assert_eq!(kernel.sent_to(EXCHANGE).len(), 1);
    }

    #[test]
    fn test_market_hours_schedule_open_wakeup() {
        let (mut state, mut kernel) = state_and_kernel();
        state.exchange_id = Some(EXCHANGE);

        let hours = Message::MarketHours {
            mkt_open: Timestamp(1_000),
            mkt_close: Timestamp(2_000),
        };
        state
            .receive_message(ME, Timestamp(100), &hours, &mut kernel)
            .unwrap();

        assert_eq!(state.mkt_open, Timestamp(1_000));
        assert!(state.is_ready_to_trade());
        assert_eq!(kernel.wakeups, vec![(ME, Timestamp(1_000))]);
    }

    #[test]
    fn test_spread_response_recorded() {
        let (mut state, mut kernel) = ready_state();

        let response = Message::QuerySpreadResponse {
            symbol: "ABM".to_string(),
            mkt_closed: false,
            depth: 1,
            bids: vec![(Price(9_900), Quantity(40))],
            asks: vec![(Price(10_000), Quantity(10))],
            last_trade: Some(Price(9_950)),
        };
        state
            .receive_message(ME, Timestamp(500), &response, &mut kernel)
            .unwrap();

        let quote = state.known_bid_ask("ABM").unwrap();
        assert_eq!(quote.best_bid(), Some((Price(9_900), Quantity(40))));
        assert_eq!(quote.best_ask(), Some((Price(10_000), Quantity(10))));
        assert_eq!(state.known_midpoint("ABM"), Some(Price(9_950)));
        assert_eq!(state.last_trade.get("ABM"), Some(&Price(9_950)));
    }

    #[test]
    fn test_execution_updates_holdings_and_orders() {
        let (mut state, mut kernel) = ready_state();

        state.place_limit_order(ME, &mut kernel, "ABM", Quantity(100), Side::Bid, Price(10_000), true);
        assert_eq!(state.orders.len(), 1);
        let order_id = *state.orders.keys().next().unwrap();

        // A partial execution of 60 shares at $100.00.
        let mut filled = state.orders[&order_id].clone();
        filled.quantity = Quantity(60);
        filled.fill_price = Some(Price(10_000));
        state
            .receive_message(
                ME,
                Timestamp(600),
                &Message::OrderExecuted {
                    order: Order::Limit(filled),
                },
                &mut kernel,
            )
            .unwrap();

        assert_eq!(state.get_holdings("ABM"), 60);
        assert_eq!(state.cash(), Cash::from_float(100_000.0) - Cash(600_000));
        assert_eq!(state.orders[&order_id].quantity, 40);

        // The rest executes; the order is retired.
        let mut rest = state.orders[&order_id].clone();
        rest.fill_price = Some(Price(10_000));
        state
            .receive_message(
                ME,
                Timestamp(700),
                &Message::OrderExecuted {
                    order: Order::Limit(rest),
                },
                &mut kernel,
            )
            .unwrap();
        assert!(state.orders.is_empty());
        assert_eq!(state.get_holdings("ABM"), 100);
    }

    #[test]
    fn test_risk_check_blocks_oversized_order() {
        let (mut state, mut kernel) = ready_state();
        state.last_trade.insert("ABM".to_string(), Price(10_000));

        // 20 shares at $100.00 is well within $100k starting cash.
        let small = state.create_limit_order(
            ME, &mut kernel, "ABM", Quantity(20), Side::Bid, Price(10_000), false,
        );
        assert!(small.is_some());

        // 20,000 shares at $100.00 would put $2M at risk.
        let large = state.create_limit_order(
            ME, &mut kernel, "ABM", Quantity(20_000), Side::Bid, Price(10_000), false,
        );
        assert!(large.is_none());

        // Reducing exposure is always allowed, even from a risky position.
        state.holdings.insert("ABM".to_string(), 20_000);
        let reducing = state.create_limit_order(
            ME, &mut kernel, "ABM", Quantity(20_000), Side::Ask, Price(10_000), false,
        );
        assert!(reducing.is_some());
    }

    #[test]
    fn test_zero_quantity_order_refused() {
        let (mut state, mut kernel) = ready_state();
        let order = state.create_limit_order(
            ME, &mut kernel, "ABM", Quantity::ZERO, Side::Bid, Price(10_000), true,
        );
        assert!(order.is_none());
    }

    #[test]
    fn test_mark_to_market_uses_midpoint_then_last_trade() {
        let (mut state, _kernel) = ready_state();
        state.holdings.insert("ABM".to_string(), 10);
        state.last_trade.insert("ABM".to_string(), Price(10_000));

        // No quotes: last trade valuation.
        let value = state.mark_to_market(&state.holdings, true);
        assert_eq!(value, Cash::from_float(100_000.0) + Cash(100_000));

        // With quotes: midpoint valuation.
        state.known_quotes.entry("ABM".to_string()).or_default().insert(
            Timestamp(1),
            Quote {
                bids: vec![(Price(9_000), Quantity(5))],
                asks: vec![(Price(11_000), Quantity(5))],
            },
        );
        let value = state.mark_to_market(&state.holdings, true);
        assert_eq!(value, Cash::from_float(100_000.0) + Cash(100_000));
        // Midpoint (10_000) happens to equal last trade here; shift the book.
        state.known_quotes.get_mut("ABM").unwrap().insert(
            Timestamp(2),
            Quote {
                bids: vec![(Price(11_000), Quantity(5))],
                asks: vec![(Price(13_000), Quantity(5))],
            },
        );
        let value = state.mark_to_market(&state.holdings, true);
        assert_eq!(value, Cash::from_float(100_000.0) + Cash(120_000));
    }

    #[test]
    fn test_close_price_recorded_as_last_trade() {
        let (mut state, mut kernel) = ready_state();
        let mut close_prices = BTreeMap::new();
        close_prices.insert("ABM".to_string(), Price(10_101));
        state
            .receive_message(
                ME,
                Timestamp(999),
                &Message::MarketClosePrice { close_prices },
                &mut kernel,
            )
            .unwrap();

        assert_eq!(state.last_trade.get("ABM"), Some(&Price(10_101)));
        assert_eq!(state.daily_close_price.get("ABM"), Some(&Price(10_101)));
    }

    #[test]
    fn test_fmt_holdings_cash_last() {
        let (mut state, _kernel) = ready_state();
        state.holdings.insert("ABM".to_string(), 25);
        let rendered = state.fmt_holdings();
        assert_eq!(rendered, "{ ABM: 25, CASH: 10000000 }");
    }

    #[test]
    fn test_kernel_stopping_reports_gain() {
        let (mut state, mut kernel) = ready_state();
        state.holdings.insert("ABM".to_string(), 10);
        state.last_trade.insert("ABM".to_string(), Price(10_000));

        state.kernel_stopping(ME, "NoiseAgent", &mut kernel);

        assert_eq!(kernel.results, vec![("NoiseAgent".to_string(), Cash(100_000))]);
        assert!(kernel.events.iter().any(|(_, kind, _)| kind == "ENDING_CASH"));
    }
}
