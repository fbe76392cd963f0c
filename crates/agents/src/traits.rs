//! Agent and kernel capability traits.
//!
//! Agents never hold references to the kernel or to one another. Each
//! lifecycle call hands the agent a `&mut dyn KernelApi` capability exposing
//! exactly the operations the kernel permits: sending messages, scheduling
//! wakeups, adjusting its own delays, and directory lookup by agent kind.

use rand::rngs::StdRng;
use types::{AgentId, Cash, Message, Nanos, OrderId, Price, Symbol, Timestamp};

use crate::error::KernelError;

/// The thin capability surface the kernel exposes to agents.
pub trait KernelApi {
    /// Current simulation time.
    fn now(&self) -> Timestamp;

    /// Send a message to another agent.
    ///
    /// Delivery time is `now + sender computation delay + accumulated
    /// per-wake delay + extra_delay + pairwise latency + jitter`. Messages
    /// sent in one wake batch share a send time unless [`Self::delay`] is
    /// used between them.
    fn send_message(
        &mut self,
        sender: AgentId,
        recipient: AgentId,
        message: Message,
        extra_delay: Nanos,
    );

    /// Schedule a wakeup for `sender` at `requested`.
    ///
    /// `Timestamp::ZERO` requests the next possible time. A requested time
    /// not strictly in the future is fatal.
    fn set_wakeup(&mut self, sender: AgentId, requested: Timestamp) -> Result<(), KernelError>;

    /// The agent's own per-delivery computation delay.
    fn get_compute_delay(&self, agent: AgentId) -> Nanos;

    /// Change the agent's per-delivery computation delay.
    fn set_compute_delay(&mut self, agent: AgentId, delay: Nanos) -> Result<(), KernelError>;

    /// Accumulate extra delay for the current wake cycle only. Staggers
    /// messages sent in one batch and postpones when the agent can next act.
    fn delay(&mut self, additional: Nanos);

    /// Find some agent of the given kind. Linear scan; cache the result.
    fn find_agent_by_kind(&self, kind: &str) -> Option<AgentId>;

    /// Mint a fresh order id.
    fn next_order_id(&mut self) -> OrderId;

    /// The kernel's seeded random source, for agent-visible randomness that
    /// must stay reproducible.
    fn rng(&mut self) -> &mut StdRng;

    /// The fundamental-value oracle, if the simulation has one.
    fn oracle(&self) -> Option<&dyn Oracle>;

    /// Append a line to the simulation event log on behalf of an agent.
    fn log_event(&mut self, agent: AgentId, event_type: &str, event: &str);

    /// Report an agent's end-of-run gain, aggregated per agent kind into the
    /// run summary.
    fn record_agent_result(&mut self, kind: &str, gain: Cash);
}

/// A participant in the simulation.
///
/// Lifecycle: `kernel_initialising` (agents must not talk to one another) →
/// `kernel_starting` (directory lookups allowed) → deliveries via `wakeup` /
/// `receive_message` → `kernel_stopping` (still connected) →
/// `kernel_terminating` (no communication). Handlers must be non-blocking
/// and finite; future continuation is requested via `set_wakeup` or
/// `send_message`.
pub trait Agent {
    /// Dense kernel-assigned identifier.
    fn id(&self) -> AgentId;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Agent kind string used by `find_agent_by_kind`.
    fn kind(&self) -> &str;

    /// Called once before the simulation begins. No other agent is
    /// guaranteed to exist yet.
    fn kernel_initialising(&mut self, _kernel: &mut dyn KernelApi) -> Result<(), KernelError> {
        Ok(())
    }

    /// Called once after all agents exist. `start_time` is the earliest
    /// moment the agent can schedule a wakeup for.
    fn kernel_starting(
        &mut self,
        start_time: Timestamp,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError>;

    /// A wakeup previously requested via `set_wakeup` has arrived.
    fn wakeup(&mut self, now: Timestamp, kernel: &mut dyn KernelApi) -> Result<(), KernelError>;

    /// A message from another agent has arrived.
    fn receive_message(
        &mut self,
        now: Timestamp,
        sender: AgentId,
        message: Message,
        kernel: &mut dyn KernelApi,
    ) -> Result<(), KernelError>;

    /// Called once when the event loop ends; agents may still communicate.
    fn kernel_stopping(&mut self, _kernel: &mut dyn KernelApi) -> Result<(), KernelError> {
        Ok(())
    }

    /// Called last; no communication is permitted.
    fn kernel_terminating(&mut self) {}
}

/// External fundamental-value source.
pub trait Oracle {
    /// The fundamental value of `symbol` at time `at`, if known.
    fn fundamental_value(&self, symbol: &Symbol, at: Timestamp) -> Option<Price>;
}
