//! Noise agent: wakes up once at a random time and places a single order at
//! the prevailing quote.
//!
//! Noise agents provide background order flow and price discovery without
//! any view on value. Each agent draws a size and a wakeup time from its
//! seeded generator, requests the spread, and crosses it in a uniformly
//! random direction.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;
use types::{AgentId, Cash, Message, Quantity, Side, Symbol, Timestamp};

use crate::error::KernelError;
use crate::state::TradingAgentState;
use crate::traits::{Agent, KernelApi};

/// Kind string for noise agents.
pub const NOISE_KIND: &str = "NoiseAgent";

/// What the agent is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoiseState {
    AwaitingWakeup,
    AwaitingSpread,
    Inactive,
}

/// Configuration for a [`NoiseAgent`].
#[derive(Debug, Clone)]
pub struct NoiseAgentConfig {
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Time at which the single order is placed.
    pub wakeup_time: Timestamp,
    /// Starting cash balance.
    pub starting_cash: Cash,
    /// Smallest order size drawn.
    pub min_size: u64,
    /// Largest order size drawn (exclusive).
    pub max_size: u64,
    /// Log order submissions and executions.
    pub log_orders: bool,
}

impl Default for NoiseAgentConfig {
    fn default() -> Self {
        Self {
            symbol: "ABM".to_string(),
            wakeup_time: Timestamp::ZERO,
            starting_cash: Cash::from_float(100_000.0),
            min_size: 20,
            max_size: 50,
            log_orders: false,
        }
    }
}

/// A trader that places one random order per session.
pub struct NoiseAgent {
    id: AgentId,
    name: String,
    config: NoiseAgentConfig,
    base: TradingAgentState,
    rng: StdRng,
    /// Order size drawn at construction.
    size: Quantity,
    /// Set once pre-market discovery is done.
    trading: bool,
    state: NoiseState,
}

impl NoiseAgent {
    /// Create a noise agent with its own generator seeded from the run seed
    /// and the agent id, so runs stay reproducible.
    pub fn new(id: AgentId, config: NoiseAgentConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(id.0 as u64));
        let size = Quantity(rng.random_range(config.min_size..config.max_size));
        let mut base = TradingAgentState::new(config.starting_cash);
        if config.log_orders {
            base = base.with_order_logging();
        }
        Self {
            id,
            name: format!("NOISE_AGENT_{}", id.0),
            config,
            base,
            rng,
            size,
            trading: false,
            state: NoiseState::AwaitingWakeup,
        }
    }

    /// Shared bookkeeping state, for inspection after a run.
    pub fn base(&self) -> &TradingAgentState {
        &self.base
    }

    /// Place one order at the prevailing quote, in a random direction.
    fn place_order(&mut self, kernel: &mut dyn KernelApi) {
        let buy = self.rng.random_bool(0.5);
        let (bid, ask) = match self.base.known_bid_ask(&self.config.symbol) {
            Some(quote) => (quote.best_bid(), quote.best_ask()),
            None => (None, None),
        };

        if self.size.is_zero() {
            return;
        }
        if buy {
            if let Some((ask_price, _)) = ask {
                self.base.place_limit_order(
                    self.id,
                    kernel,
                    &self.config.symbol,
                    self.size,
                    Side::Bid,
                    ask_price,
                    true,
                );
            }
        } else if let Some((bid_price, _)) = bid {
            self.base.place_limit_order(
                self.id,
                kernel,
                &self.config.symbol,
                self.size,
                Side::Ask,
                bid_price,
                true,
            );
        }
    }
}

impl Agent for NoiseAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        NOISE_KIND
    }

    fn kernel_starting(
        &mut self,
        start_time: Timestamp,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError> {
        self.base.kernel_starting(self.id, start_time, kernel)
    }

    fn wakeup(&mut self, now: Timestamp, kernel: &mut dyn KernelApi) -> Result<(), KernelError> {
        let ready = self.base.wakeup(self.id, now, kernel)?;
        self.state = NoiseState::Inactive;

        if !self.base.mkt_open.is_valid() || !self.base.mkt_close.is_valid() {
            // Market-hours discovery is still in flight.
            return Ok(());
        }
        if !self.trading {
            self.trading = true;
            debug!(agent = %self.name, "ready to start trading");
        }

        if self.base.mkt_closed {
            // Nothing left to do once the close has been observed.
            return Ok(());
        }
        if self.config.wakeup_time > now {
            self.state = NoiseState::AwaitingWakeup;
            return kernel.set_wakeup(self.id, self.config.wakeup_time);
        }
        if ready {
            self.base
                .get_current_spread(self.id, kernel, &self.config.symbol, 1);
            self.state = NoiseState::AwaitingSpread;
        }
        Ok(())
    }

    fn receive_message(
        &mut self,
        now: Timestamp,
        _sender: AgentId,
        message: Message,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError> {
        self.base.receive_message(self.id, now, &message, kernel)?;

        if self.state == NoiseState::AwaitingSpread {
            if let Message::QuerySpreadResponse { .. } = message {
                if self.base.mkt_closed {
                    return Ok(());
                }
                self.place_order(kernel);
                self.state = NoiseState::AwaitingWakeup;
            }
        }
        Ok(())
    }

    fn kernel_stopping(&mut self, kernel: &mut dyn KernelApi) -> Result<(), KernelError> {
        // End-of-day valuation: holdings at the known midpoint, falling back
        // to the last trade.
        let holdings = self.base.get_holdings(&self.config.symbol);
        let reference = self
            .base
            .known_midpoint(&self.config.symbol)
            .or_else(|| self.base.last_trade.get(&self.config.symbol).copied());

        if let Some(price) = reference {
            let mut surplus = price.raw() * holdings;
            surplus += self.base.cash().raw() - self.base.starting_cash().raw();
            let relative = surplus as f64 / self.base.starting_cash().raw() as f64;
            kernel.log_event(self.id, "FINAL_VALUATION", &format!("{relative:.6}"));
            debug!(
                agent = %self.name,
                holdings,
                cash = %self.base.cash(),
                fundamental = %price,
                surplus,
                "final report"
            );
        } else {
            kernel.log_event(
                self.id,
                "FINAL_VALUATION",
                &self.base.starting_cash().to_string(),
            );
        }

        self.base.kernel_stopping(self.id, NOISE_KIND, kernel);
        Ok(())
    }
}
