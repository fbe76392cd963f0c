//! The exchange agent: hosts order books, serves queries and market-data
//! subscriptions, and distributes close prices at the end of the session.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use types::{
    AgentId, MarketData, MarketDataMsg, MarketDataSub, MarketDataSubReq, Message, Nanos, Price,
    Quantity, Side, Symbol, Timestamp,
};

use sim_core::OrderBook;

use crate::error::KernelError;
use crate::traits::{Agent, KernelApi};

/// Kind string used to discover the exchange via `find_agent_by_kind`.
pub const EXCHANGE_KIND: &str = "ExchangeAgent";

/// Configuration for an [`ExchangeAgent`].
#[derive(Debug, Clone)]
pub struct ExchangeAgentConfig {
    /// Symbols traded on this exchange, one order book each.
    pub symbols: Vec<Symbol>,
    pub mkt_open: Timestamp,
    pub mkt_close: Timestamp,
    /// Snapshot the book into its log after each execution.
    pub book_logging: bool,
    /// Depth of logged snapshots.
    pub book_log_depth: usize,
    /// Parallel-pipeline delay added to order activity only, not to simple
    /// inquiries.
    pub pipeline_delay: Nanos,
    /// Computation delay applied to every wakeup or message received.
    pub computational_delay: Nanos,
    /// Number of order-stream records retained per book (0 keeps all).
    pub stream_history: usize,
    /// Track per-symbol session metrics and log them at the end of the run.
    pub use_metric_tracker: bool,
}

impl ExchangeAgentConfig {
    pub fn new(symbols: Vec<Symbol>, mkt_open: Timestamp, mkt_close: Timestamp) -> Self {
        Self {
            symbols,
            mkt_open,
            mkt_close,
            book_logging: false,
            book_log_depth: 10,
            pipeline_delay: 40_000,
            computational_delay: 1,
            stream_history: 0,
            use_metric_tracker: true,
        }
    }

    pub fn with_book_logging(mut self, depth: usize) -> Self {
        self.book_logging = true;
        self.book_log_depth = depth;
        self
    }

    pub fn with_pipeline_delay(mut self, delay: Nanos) -> Self {
        self.pipeline_delay = delay;
        self
    }

    pub fn with_computational_delay(mut self, delay: Nanos) -> Self {
        self.computational_delay = delay;
        self
    }

    pub fn with_stream_history(mut self, length: usize) -> Self {
        self.stream_history = length;
        self
    }
}

/// One active market-data subscription.
#[derive(Debug, Clone)]
struct Subscription {
    symbol: Symbol,
    kind: MarketDataSub,
    /// Last time a frequency-based update was emitted.
    last_update_ts: Timestamp,
    /// Whether an imbalance event is currently open (between Start and
    /// Finish stages).
    imbalance_active: bool,
}

/// Per-symbol session metrics, logged at the end of the run.
#[derive(Debug, Clone, Default)]
struct MetricTracker {
    buy_volume: Quantity,
    sell_volume: Quantity,
    close_price: Option<Price>,
}

/// The exchange: one per simulation, created before any trading agent.
pub struct ExchangeAgent {
    id: AgentId,
    name: String,
    config: ExchangeAgentConfig,
    order_books: BTreeMap<Symbol, OrderBook>,
    metric_trackers: BTreeMap<Symbol, MetricTracker>,
    data_subscriptions: BTreeMap<AgentId, Vec<Subscription>>,
    market_close_price_subscriptions: BTreeSet<AgentId>,
    close_price_sent: bool,
}

impl ExchangeAgent {
    pub fn new(id: AgentId, config: ExchangeAgentConfig) -> Self {
        let order_books = config
            .symbols
            .iter()
            .map(|symbol| {
                let mut book = OrderBook::new(symbol.clone(), config.mkt_open)
                    .with_history_limit(config.stream_history);
                if config.book_logging {
                    book = book.with_book_logging(config.book_log_depth);
                }
                (symbol.clone(), book)
            })
            .collect();

        let metric_trackers = config
            .symbols
            .iter()
            .map(|symbol| (symbol.clone(), MetricTracker::default()))
            .collect();

        Self {
            id,
            name: format!("EXCHANGE_AGENT_{}", id.0),
            config,
            order_books,
            metric_trackers,
            data_subscriptions: BTreeMap::new(),
            market_close_price_subscriptions: BTreeSet::new(),
            close_price_sent: false,
        }
    }

    /// Read access to one symbol's book, mainly for inspection in tests.
    pub fn order_book(&self, symbol: &str) -> Option<&OrderBook> {
        self.order_books.get(symbol)
    }

    fn mkt_closed_at(&self, now: Timestamp) -> bool {
        now > self.config.mkt_close
    }

    /// Send the notifications and event lines accumulated by a book
    /// operation. Order activity carries the pipeline delay; queries do not.
    fn flush_book(
        &mut self,
        symbol: &str,
        kernel: &mut dyn KernelApi,
        order_activity: bool,
    ) {
        let Some(book) = self.order_books.get_mut(symbol) else {
            return;
        };
        let extra_delay = if order_activity {
            self.config.pipeline_delay
        } else {
            0
        };
        for (recipient, message) in book.drain_notifications() {
            kernel.send_message(self.id, recipient, message, extra_delay);
        }
        for (event_type, line) in book.drain_events() {
            kernel.log_event(self.id, &event_type, &line);
        }
    }

    /// Evaluate subscriptions for `symbol` after a book mutation.
    ///
    /// Frequency-based subscriptions emit when at least `freq` nanoseconds
    /// have passed since their last update; imbalance subscriptions are
    /// edge-triggered around their threshold.
    fn publish_market_data(&mut self, symbol: &str, now: Timestamp, kernel: &mut dyn KernelApi) {
        let Some(book) = self.order_books.get(symbol) else {
            return;
        };
        let last_transaction = book.last_trade();

        for (&recipient, subscriptions) in self.data_subscriptions.iter_mut() {
            for sub in subscriptions.iter_mut().filter(|s| s.symbol == symbol) {
                let data = match &sub.kind {
                    MarketDataSub::L1 { freq } => {
                        if now - sub.last_update_ts < *freq {
                            continue;
                        }
                        sub.last_update_ts = now;
                        MarketData::L1 {
                            bid: book.get_l1_data(Side::Bid),
                            ask: book.get_l1_data(Side::Ask),
                        }
                    }
                    MarketDataSub::L2 { freq, depth } => {
                        if now - sub.last_update_ts < *freq {
                            continue;
                        }
                        sub.last_update_ts = now;
                        MarketData::L2 {
                            bids: book.get_l2_data(Side::Bid, *depth),
                            asks: book.get_l2_data(Side::Ask, *depth),
                        }
                    }
                    MarketDataSub::L3 { freq, depth } => {
                        if now - sub.last_update_ts < *freq {
                            continue;
                        }
                        sub.last_update_ts = now;
                        MarketData::L3 {
                            bids: book.get_l3_data(Side::Bid, *depth),
                            asks: book.get_l3_data(Side::Ask, *depth),
                        }
                    }
                    MarketDataSub::TransactedVol { freq, lookback } => {
                        if now - sub.last_update_ts < *freq {
                            continue;
                        }
                        sub.last_update_ts = now;
                        let (bid_volume, ask_volume) = book.get_transacted_volume(*lookback, now);
                        MarketData::TransactedVol {
                            bid_volume,
                            ask_volume,
                        }
                    }
                    MarketDataSub::BookImbalance { min_imbalance } => {
                        let (imbalance, side) = book.get_imbalance();
                        let stage = if !sub.imbalance_active && imbalance >= *min_imbalance {
                            sub.imbalance_active = true;
                            types::Stage::Start
                        } else if sub.imbalance_active && imbalance < *min_imbalance {
                            sub.imbalance_active = false;
                            types::Stage::Finish
                        } else {
                            continue;
                        };
                        MarketData::BookImbalance {
                            stage,
                            imbalance,
                            side,
                        }
                    }
                };

                kernel.send_message(
                    self.id,
                    recipient,
                    Message::MarketData(MarketDataMsg {
                        symbol: symbol.to_string(),
                        last_transaction,
                        exchange_ts: now,
                        data,
                    }),
                    0,
                );
            }
        }
    }

    fn register_subscription(&mut self, sender: AgentId, request: MarketDataSubReq, now: Timestamp) {
        if request.cancel {
            let mut now_empty = false;
            if let Some(subscriptions) = self.data_subscriptions.get_mut(&sender) {
                subscriptions
                    .retain(|sub| !(sub.symbol == request.symbol && sub.kind == request.kind));
                now_empty = subscriptions.is_empty();
            }
            if now_empty {
                self.data_subscriptions.remove(&sender);
            }
            debug!(agent = %sender, symbol = %request.symbol, "cancelled market data subscription");
        } else {
            self.data_subscriptions
                .entry(sender)
                .or_default()
                .push(Subscription {
                    symbol: request.symbol,
                    kind: request.kind,
                    last_update_ts: now,
                    imbalance_active: false,
                });
        }
    }

    /// Distribute closing prices to every agent that asked for them.
    fn send_close_prices(&mut self, now: Timestamp, kernel: &mut dyn KernelApi) {
        if self.close_price_sent {
            return;
        }
        self.close_price_sent = true;

        let close_prices: BTreeMap<Symbol, Price> = self
            .order_books
            .iter()
            .filter_map(|(symbol, book)| book.last_trade().map(|p| (symbol.clone(), p)))
            .collect();

        for &recipient in &self.market_close_price_subscriptions {
            kernel.send_message(
                self.id,
                recipient,
                Message::MarketClosePrice {
                    close_prices: close_prices.clone(),
                },
                0,
            );
        }
        debug!(at = %now, subscribers = self.market_close_price_subscriptions.len(), "sent market close prices");
    }
}

impl Agent for ExchangeAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        EXCHANGE_KIND
    }

    fn kernel_starting(
        &mut self,
        _start_time: Timestamp,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError> {
        kernel.set_compute_delay(self.id, self.config.computational_delay)?;
        // Wake at market close to distribute closing prices.
        kernel.set_wakeup(self.id, self.config.mkt_close)
    }

    fn wakeup(&mut self, now: Timestamp, kernel: &mut dyn KernelApi) -> Result<(), KernelError> {
        if now >= self.config.mkt_close {
            self.send_close_prices(now, kernel);
        }
        Ok(())
    }

    fn receive_message(
        &mut self,
        now: Timestamp,
        sender: AgentId,
        message: Message,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError> {
        // After the close, nothing but the close-price delivery flows.
        if self.mkt_closed_at(now) {
            kernel.send_message(self.id, sender, Message::MarketClosed, 0);
            return Ok(());
        }

        let mkt_closed = self.mkt_closed_at(now);
        match message {
            Message::LimitOrder(order) => {
                let symbol = order.symbol.clone();
                match self.order_books.get_mut(&symbol) {
                    Some(book) => {
                        if let Err(err) = book.handle_limit_order(order, now, false) {
                            warn!(%err, "limit order discarded");
                        }
                        self.flush_book(&symbol, kernel, true);
                        self.publish_market_data(&symbol, now, kernel);
                    }
                    None => warn!(%symbol, "limit order for unknown symbol discarded"),
                }
            }

            Message::MarketOrder(order) => {
                let symbol = order.symbol.clone();
                match self.order_books.get_mut(&symbol) {
                    Some(book) => {
                        if let Err(err) = book.handle_market_order(order, now) {
                            warn!(%err, "market order discarded");
                        }
                        self.flush_book(&symbol, kernel, true);
                        self.publish_market_data(&symbol, now, kernel);
                    }
                    None => warn!(%symbol, "market order for unknown symbol discarded"),
                }
            }

            Message::CancelOrder { order } => {
                let symbol = order.symbol.clone();
                if let Some(book) = self.order_books.get_mut(&symbol) {
                    if !book.cancel_order(&order, now, false) {
                        debug!(%order, "cancellation for order not in book");
                    }
                    self.flush_book(&symbol, kernel, true);
                    self.publish_market_data(&symbol, now, kernel);
                }
            }

            Message::PartialCancelOrder { order, quantity } => {
                let symbol = order.symbol.clone();
                if let Some(book) = self.order_books.get_mut(&symbol) {
                    if !book.partial_cancel_order(&order, quantity, now) {
                        debug!(%order, "partial cancellation for order not in book");
                    }
                    self.flush_book(&symbol, kernel, true);
                    self.publish_market_data(&symbol, now, kernel);
                }
            }

            Message::ModifyOrder { order, new_order } => {
                let symbol = order.symbol.clone();
                if let Some(book) = self.order_books.get_mut(&symbol) {
                    if !book.modify_order(&order, new_order, now, false) {
                        debug!(%order, "modification for order not in book");
                    }
                    self.flush_book(&symbol, kernel, true);
                    self.publish_market_data(&symbol, now, kernel);
                }
            }

            Message::ReplaceOrder { order, new_order } => {
                let symbol = order.symbol.clone();
                if let Some(book) = self.order_books.get_mut(&symbol) {
                    if !book.replace_order(sender, &order, new_order, now) {
                        debug!(%order, "replacement for order not in book");
                    }
                    self.flush_book(&symbol, kernel, true);
                    self.publish_market_data(&symbol, now, kernel);
                }
            }

            Message::MarketHoursRequest => {
                kernel.send_message(
                    self.id,
                    sender,
                    Message::MarketHours {
                        mkt_open: self.config.mkt_open,
                        mkt_close: self.config.mkt_close,
                    },
                    0,
                );
            }

            Message::MarketClosePriceRequest => {
                self.market_close_price_subscriptions.insert(sender);
            }

            Message::QueryLastTrade { symbol } => match self.order_books.get(&symbol) {
                Some(book) => {
                    kernel.send_message(
                        self.id,
                        sender,
                        Message::QueryLastTradeResponse {
                            symbol,
                            mkt_closed,
                            last_trade: book.last_trade(),
                        },
                        0,
                    );
                }
                None => warn!(%symbol, "last-trade query for unknown symbol"),
            },

            Message::QuerySpread { symbol, depth } => match self.order_books.get(&symbol) {
                Some(book) => {
                    kernel.send_message(
                        self.id,
                        sender,
                        Message::QuerySpreadResponse {
                            symbol,
                            mkt_closed,
                            depth,
                            bids: book.get_l2_data(Side::Bid, depth),
                            asks: book.get_l2_data(Side::Ask, depth),
                            last_trade: book.last_trade(),
                        },
                        0,
                    );
                }
                None => warn!(%symbol, "spread query for unknown symbol"),
            },

            Message::QueryOrderStream { symbol, length } => match self.order_books.get(&symbol) {
                Some(book) => {
                    kernel.send_message(
                        self.id,
                        sender,
                        Message::QueryOrderStreamResponse {
                            symbol,
                            mkt_closed,
                            length,
                            orders: book.get_order_stream(length),
                        },
                        0,
                    );
                }
                None => warn!(%symbol, "order-stream query for unknown symbol"),
            },

            Message::QueryTransactedVol { symbol, lookback } => {
                match self.order_books.get(&symbol) {
                    Some(book) => {
                        let (bid_volume, ask_volume) = book.get_transacted_volume(lookback, now);
                        kernel.send_message(
                            self.id,
                            sender,
                            Message::QueryTransactedVolResponse {
                                symbol,
                                mkt_closed,
                                bid_volume,
                                ask_volume,
                            },
                            0,
                        );
                    }
                    None => warn!(%symbol, "transacted-volume query for unknown symbol"),
                }
            }

            Message::MarketDataSubReq(request) => {
                self.register_subscription(sender, request, now);
            }

            other => {
                warn!(kind = other.kind(), %sender, "exchange received unexpected message");
            }
        }
        Ok(())
    }

    fn kernel_stopping(&mut self, kernel: &mut dyn KernelApi) -> Result<(), KernelError> {
        if !self.config.use_metric_tracker {
            return Ok(());
        }
        let now = kernel.now();
        for (symbol, book) in &self.order_books {
            let (buy_volume, sell_volume) =
                book.get_transacted_volume(now.nanos().max(0), now);
            let tracker = MetricTracker {
                buy_volume,
                sell_volume,
                close_price: book.last_trade(),
            };
            kernel.log_event(
                self.id,
                "SESSION_METRICS",
                &format!(
                    "{},buy_volume={},sell_volume={},close={}",
                    symbol,
                    tracker.buy_volume,
                    tracker.sell_volume,
                    tracker
                        .close_price
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                ),
            );
            self.metric_trackers.insert(symbol.clone(), tracker);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockKernel;
    use types::{LimitOrder, Stage};

    const EXCHANGE: AgentId = AgentId(0);
    const TRADER: AgentId = AgentId(1);

    fn exchange() -> ExchangeAgent {
        ExchangeAgent::new(
            EXCHANGE,
            ExchangeAgentConfig::new(
                vec!["ABM".to_string()],
                Timestamp(0),
                Timestamp(1_000_000_000),
            ),
        )
    }

    fn limit(id: u64, side: Side, price: i64, qty: u64) -> LimitOrder {
        LimitOrder::new(
            types::OrderId(id),
            TRADER,
            Timestamp(0),
            "ABM",
            Quantity(qty),
            side,
            Price(price),
        )
    }

    #[test]
    fn test_market_hours_request() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        agent
            .receive_message(Timestamp(100), TRADER, Message::MarketHoursRequest, &mut kernel)
            .unwrap();

        assert!(matches!(
            kernel.sent_to(TRADER).as_slice(),
            [Message::MarketHours { mkt_open, mkt_close }]
                if *mkt_open == Timestamp(0) && *mkt_close == Timestamp(1_000_000_000)
        ));
    }

    #[test]
    fn test_limit_order_accepted_with_pipeline_delay() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        agent
            .receive_message(
                Timestamp(100),
                TRADER,
                Message::LimitOrder(limit(1, Side::Bid, 10_000, 50)),
                &mut kernel,
            )
            .unwrap();

        // Acceptance is delivered with the order-pipeline delay applied.
        let (_, to, message, extra) = &kernel.sent[0];
        assert_eq!(*to, TRADER);
        assert!(matches!(message, Message::OrderAccepted { .. }));
        assert_eq!(*extra, 40_000);

        let book = agent.order_book("ABM").unwrap();
        assert_eq!(book.get_l1_data(Side::Bid), Some((Price(10_000), Quantity(50))));
    }

    #[test]
    fn test_query_spread_roundtrip() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        agent
            .receive_message(
                Timestamp(100),
                TRADER,
                Message::LimitOrder(limit(1, Side::Bid, 9_900, 40)),
                &mut kernel,
            )
            .unwrap();
        kernel.sent.clear();

        agent
            .receive_message(
                Timestamp(200),
                AgentId(2),
                Message::QuerySpread {
                    symbol: "ABM".to_string(),
                    depth: 3,
                },
                &mut kernel,
            )
            .unwrap();

        let (_, _, message, extra) = &kernel.sent[0];
        assert_eq!(*extra, 0, "queries carry no pipeline delay");
        assert!(matches!(
            message,
            Message::QuerySpreadResponse { bids, asks, mkt_closed: false, .. }
                if bids == &vec![(Price(9_900), Quantity(40))] && asks.is_empty()
        ));
    }

    #[test]
    fn test_close_price_subscription() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        agent
            .receive_message(Timestamp(100), TRADER, Message::MarketClosePriceRequest, &mut kernel)
            .unwrap();

        // Trade to establish a close price.
        agent
            .receive_message(
                Timestamp(200),
                AgentId(2),
                Message::LimitOrder(limit(1, Side::Bid, 10_000, 50)),
                &mut kernel,
            )
            .unwrap();
        agent
            .receive_message(
                Timestamp(300),
                AgentId(3),
                Message::LimitOrder(limit(2, Side::Ask, 10_000, 50)),
                &mut kernel,
            )
            .unwrap();
        kernel.sent.clear();

        kernel.now = Timestamp(1_000_000_000);
        agent.wakeup(Timestamp(1_000_000_000), &mut kernel).unwrap();

        assert!(matches!(
            kernel.sent_to(TRADER).as_slice(),
            [Message::MarketClosePrice { close_prices }]
                if close_prices.get("ABM") == Some(&Price(10_000))
        ));

        // The distribution happens once.
        agent.wakeup(Timestamp(1_000_000_001), &mut kernel).unwrap();
        assert_eq!(kernel.sent_to(TRADER).len(), 1);
    }

    #[test]
    fn test_post_close_requests_refused() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(2_000_000_000));

        agent
            .receive_message(
                Timestamp(2_000_000_000),
                TRADER,
                Message::QuerySpread {
                    symbol: "ABM".to_string(),
                    depth: 1,
                },
                &mut kernel,
            )
            .unwrap();

        assert!(matches!(
            kernel.sent_to(TRADER).as_slice(),
            [Message::MarketClosed]
        ));
    }

    #[test]
    fn test_l1_subscription_fires_on_mutation() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        agent
            .receive_message(
                Timestamp(100),
                TRADER,
                Message::MarketDataSubReq(MarketDataSubReq {
                    symbol: "ABM".to_string(),
                    cancel: false,
                    kind: MarketDataSub::L1 { freq: 1_000 },
                }),
                &mut kernel,
            )
            .unwrap();

        // Mutation before the frequency elapses: no update.
        agent
            .receive_message(
                Timestamp(500),
                AgentId(2),
                Message::LimitOrder(limit(1, Side::Bid, 9_900, 10)),
                &mut kernel,
            )
            .unwrap();
        assert!(kernel.sent_to(TRADER).is_empty());

        // Mutation after the frequency elapses: one L1 update.
        agent
            .receive_message(
                Timestamp(1_200),
                AgentId(2),
                Message::LimitOrder(limit(2, Side::Bid, 9_950, 20)),
                &mut kernel,
            )
            .unwrap();
        assert!(matches!(
            kernel.sent_to(TRADER).as_slice(),
            [Message::MarketData(MarketDataMsg {
                data: MarketData::L1 { bid: Some((price, _)), .. },
                ..
            })] if *price == Price(9_950)
        ));
    }

    #[test]
    fn test_subscription_cancel() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        let request = MarketDataSubReq {
            symbol: "ABM".to_string(),
            cancel: false,
            kind: MarketDataSub::L1 { freq: 0 },
        };
        agent
            .receive_message(
                Timestamp(100),
                TRADER,
                Message::MarketDataSubReq(request.clone()),
                &mut kernel,
            )
            .unwrap();
        agent
            .receive_message(
                Timestamp(200),
                TRADER,
                Message::MarketDataSubReq(MarketDataSubReq {
                    cancel: true,
                    ..request
                }),
                &mut kernel,
            )
            .unwrap();

        agent
            .receive_message(
                Timestamp(300),
                AgentId(2),
                Message::LimitOrder(limit(1, Side::Bid, 9_900, 10)),
                &mut kernel,
            )
            .unwrap();
        assert!(kernel.sent_to(TRADER).is_empty());
    }

    #[test]
    fn test_imbalance_subscription_edges() {
        let mut agent = exchange();
        let mut kernel = MockKernel::new(Timestamp(100));

        agent
            .receive_message(
                Timestamp(100),
                TRADER,
                Message::MarketDataSubReq(MarketDataSubReq {
                    symbol: "ABM".to_string(),
                    cancel: false,
                    kind: MarketDataSub::BookImbalance { min_imbalance: 0.9 },
                }),
                &mut kernel,
            )
            .unwrap();

        // One-sided book: imbalance 1.0, Start event.
        agent
            .receive_message(
                Timestamp(200),
                AgentId(2),
                Message::LimitOrder(limit(1, Side::Bid, 9_900, 100)),
                &mut kernel,
            )
            .unwrap();
        assert!(matches!(
            kernel.sent_to(TRADER).as_slice(),
            [Message::MarketData(MarketDataMsg {
                data: MarketData::BookImbalance { stage: Stage::Start, side: Some(Side::Bid), .. },
                ..
            })]
        ));
        kernel.sent.clear();

        // Balancing ask flow: Finish event.
        agent
            .receive_message(
                Timestamp(300),
                AgentId(3),
                Message::LimitOrder(limit(2, Side::Ask, 10_100, 80)),
                &mut kernel,
            )
            .unwrap();
        assert!(matches!(
            kernel.sent_to(TRADER).as_slice(),
            [Message::MarketData(MarketDataMsg {
                data: MarketData::BookImbalance { stage: Stage::Finish, .. },
                ..
            })]
        ));
    }
}
