//! The discrete-event kernel.
//!
//! A priority queue of timed messages drives a virtual nanosecond clock. The
//! kernel owns the agents exclusively; every inter-agent interaction passes
//! through it and is subject to computation-delay and latency "physics". For
//! a fixed seed, agent set, and delay/latency configuration, the sequence of
//! deliveries every agent observes is identical across runs and platforms.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use types::{AgentId, Cash, Message, Nanos, OrderId, Timestamp};

use agents::{Agent, KernelApi, KernelError, Oracle};

use crate::config::KernelConfig;
use crate::latency::{ConstantLatency, LatencyModel};
use crate::logger::{EventLogger, NullLogger};

/// Substituted when a wakeup is requested with the `Timestamp::ZERO`
/// sentinel, meaning "the next possible time".
pub const DEFAULT_WAKEUP_OFFSET_NS: Nanos = 1_000;

/// Upper bound (inclusive) of the per-message delivery jitter drawn from the
/// kernel generator.
const DELIVERY_JITTER_NS: Nanos = 3;

/// A message sitting in the kernel queue.
///
/// Ordering is by `(deliver_at, uniq_id)` ascending. The uniq id is minted
/// at enqueue time and preserved verbatim when a message is re-queued for an
/// agent that is still "in the future", so ties always resolve in
/// construction order regardless of heap internals.
#[derive(Debug, Clone)]
struct ScheduledMessage {
    deliver_at: Timestamp,
    uniq_id: u64,
    sender: AgentId,
    recipient: AgentId,
    message: Message,
}

impl PartialEq for ScheduledMessage {
    fn eq(&self, other: &Self) -> bool {
        self.deliver_at == other.deliver_at && self.uniq_id == other.uniq_id
    }
}

impl Eq for ScheduledMessage {}

impl Ord for ScheduledMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: the earliest (deliver_at, uniq_id) is the max of the
        // std max-heap.
        (other.deliver_at, other.uniq_id).cmp(&(self.deliver_at, self.uniq_id))
    }
}

impl PartialOrd for ScheduledMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The simulation kernel: agents, virtual clock, message queue, and the
/// per-agent delay bookkeeping.
pub struct Kernel {
    name: String,
    config: KernelConfig,
    current_time: Timestamp,
    messages: BinaryHeap<ScheduledMessage>,
    /// Agent storage; an entry is `None` only while its agent is being
    /// dispatched to.
    agents: Vec<Option<Box<dyn Agent>>>,
    agent_names: Vec<String>,
    agent_kinds: Vec<String>,
    /// Each agent's own clock; it cannot observe anything earlier.
    agent_current_times: Vec<Timestamp>,
    agent_computation_delays: Vec<Nanos>,
    latency: Box<dyn LatencyModel>,
    /// Extra delay accumulated by the agent currently being dispatched;
    /// reset before every delivery.
    current_agent_additional_delay: Nanos,
    rng: StdRng,
    next_uniq_id: u64,
    next_order_id: u64,
    oracle: Option<Box<dyn Oracle>>,
    logger: Box<dyn EventLogger>,
    custom_state: BTreeMap<String, String>,
    /// Summed end-of-run gains and agent counts per agent kind.
    result_by_kind: BTreeMap<String, (i64, u64)>,
    ttl_messages: u64,
}

impl Kernel {
    pub fn new(name: impl Into<String>, config: KernelConfig) -> Self {
        let seed = config.seed;
        let default_latency = config.default_latency;
        Self {
            name: name.into(),
            config,
            current_time: Timestamp::INVALID,
            messages: BinaryHeap::new(),
            agents: Vec::new(),
            agent_names: Vec::new(),
            agent_kinds: Vec::new(),
            agent_current_times: Vec::new(),
            agent_computation_delays: Vec::new(),
            latency: Box::new(ConstantLatency::new(default_latency)),
            current_agent_additional_delay: 0,
            rng: StdRng::seed_from_u64(seed),
            next_uniq_id: 0,
            next_order_id: 1,
            oracle: None,
            logger: Box::new(NullLogger),
            custom_state: BTreeMap::new(),
            result_by_kind: BTreeMap::new(),
            ttl_messages: 0,
        }
    }

    /// Install a pairwise latency model in place of the default constant.
    pub fn with_latency_model(mut self, latency: Box<dyn LatencyModel>) -> Self {
        self.latency = latency;
        self
    }

    /// Install a fundamental-value oracle reachable via the agent
    /// capability.
    pub fn with_oracle(mut self, oracle: Box<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Install an event-log sink.
    pub fn with_logger(mut self, logger: Box<dyn EventLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Register an agent. Agents must be added in id order: the id is the
    /// index into every per-agent array.
    pub fn add_agent(&mut self, agent: Box<dyn Agent>) {
        debug_assert_eq!(
            agent.id().as_usize(),
            self.agents.len(),
            "agents must be registered in dense id order"
        );
        debug!(id = %agent.id(), name = agent.name(), "registering agent");
        self.agent_names.push(agent.name().to_string());
        self.agent_kinds.push(agent.kind().to_string());
        self.agent_current_times.push(Timestamp::INVALID);
        self.agent_computation_delays
            .push(self.config.default_computation_delay);
        self.agents.push(Some(agent));
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Inspect an agent after (or between) runs.
    pub fn agent(&self, id: AgentId) -> Option<&dyn Agent> {
        self.agents
            .get(id.as_usize())
            .and_then(|slot| slot.as_deref())
    }

    /// Run `num_simulations` back-to-back simulations and return the
    /// accumulated custom state.
    pub fn run(&mut self) -> Result<BTreeMap<String, String>, KernelError> {
        let wall_start = Instant::now();
        info!(kernel = %self.name, agents = self.agents.len(), "kernel starting");

        for sim in 0..self.config.num_simulations.max(1) {
            self.event_line(&format!("Starting sim {sim}"));
            self.run_one_simulation()?;
            self.event_line(&format!("Ending sim {sim}"));
        }

        let elapsed = wall_start.elapsed().as_secs_f64();
        self.custom_state.insert(
            "kernel_event_queue_elapsed_wallclock".to_string(),
            format!("{elapsed:.6}"),
        );
        if let Some(slowest) = self.agent_current_times.iter().max() {
            self.custom_state.insert(
                "kernel_slowest_agent_finish_time".to_string(),
                slowest.to_string(),
            );
        }
        let mean_gains: Vec<(String, String)> = self
            .result_by_kind
            .iter()
            .map(|(kind, (gain_sum, count))| {
                let mean = Cash(gain_sum / (*count).max(1) as i64);
                (kind.clone(), mean.to_string())
            })
            .collect();
        for (kind, mean) in mean_gains {
            self.event_line(&format!("Mean ending gain for {kind}: {mean}"));
            self.custom_state
                .insert(format!("mean_ending_gain_{kind}"), mean);
        }
        self.write_summary_log();

        info!(
            kernel = %self.name,
            messages = self.ttl_messages,
            elapsed_s = elapsed,
            "simulation ending"
        );
        Ok(self.custom_state.clone())
    }

    fn run_one_simulation(&mut self) -> Result<(), KernelError> {
        // Fresh clock, queue, and generator so every simulation in a batch
        // observes the same physics.
        self.current_time = Timestamp::INVALID;
        self.current_agent_additional_delay = 0;
        self.messages.clear();
        self.rng = StdRng::seed_from_u64(self.config.seed);
        for slot in self.agent_current_times.iter_mut() {
            *slot = self.config.start_time;
        }

        // Agents must not talk to one another yet.
        self.event_line("--- Agent.kernel_initialising ---");
        for idx in 0..self.agents.len() {
            self.dispatch_lifecycle(idx, |agent, kernel| agent.kernel_initialising(kernel))?;
        }

        // All agents exist now; directory lookups are allowed.
        self.event_line("--- Agent.kernel_starting ---");
        let start_time = self.config.start_time;
        for idx in 0..self.agents.len() {
            self.dispatch_lifecycle(idx, |agent, kernel| {
                agent.kernel_starting(start_time, kernel)
            })?;
        }

        self.current_time = self.config.start_time;
        self.event_line("--- Kernel clock started ---");

        let queue_wall_start = Instant::now();
        self.event_line(&format!(
            "Kernel will start processing messages; queue length: {}",
            self.messages.len()
        ));

        // Process until the queue drains (nothing can ever wake again) or
        // the clock passes the stop time.
        while let Some(scheduled) = self.messages.pop() {
            self.current_time = scheduled.deliver_at;
            if self.current_time > self.config.stop_time {
                self.event_line("--- Kernel stop time surpassed ---");
                break;
            }

            // Between messages, the per-wake additional delay always resets.
            self.current_agent_additional_delay = 0;

            self.ttl_messages += 1;
            if self.ttl_messages % 100_000 == 0 {
                info!(
                    time = %self.current_time,
                    messages = self.ttl_messages,
                    wallclock_s = queue_wall_start.elapsed().as_secs_f64(),
                    "event queue progress"
                );
            }

            let idx = scheduled.recipient.as_usize();
            if idx >= self.agents.len() {
                warn!(recipient = %scheduled.recipient, "message for unknown agent dropped");
                continue;
            }

            // An agent still busy with earlier work cannot observe this
            // message yet; push it back to when the agent can act,
            // keeping its uniq id.
            if self.agent_current_times[idx] > self.current_time {
                let deliver_at = self.agent_current_times[idx];
                debug!(
                    recipient = %scheduled.recipient,
                    until = %deliver_at,
                    "agent in the future; message re-queued"
                );
                self.messages.push(ScheduledMessage {
                    deliver_at,
                    ..scheduled
                });
                continue;
            }

            self.agent_current_times[idx] = self.current_time;

            let Some(mut agent) = self.agents[idx].take() else {
                warn!(recipient = %scheduled.recipient, "agent slot empty; message dropped");
                continue;
            };
            let now = self.current_time;
            let outcome = match scheduled.message {
                Message::Wakeup => agent.wakeup(now, self),
                message => agent.receive_message(now, scheduled.sender, message, self),
            };
            self.agents[idx] = Some(agent);
            outcome?;

            // The agent is busy for its computation delay plus whatever
            // extra delay it accumulated while handling this delivery.
            self.agent_current_times[idx] =
                self.current_time + self.agent_computation_delays[idx] + self.current_agent_additional_delay;
        }

        if self.messages.is_empty() {
            self.event_line("--- Kernel event queue empty ---");
        }

        // Agents may still communicate with one another here.
        self.event_line("--- Agent.kernel_stopping ---");
        for idx in 0..self.agents.len() {
            self.dispatch_lifecycle(idx, |agent, kernel| agent.kernel_stopping(kernel))?;
        }

        // And here they may not.
        self.event_line("--- Agent.kernel_terminating ---");
        for slot in self.agents.iter_mut() {
            if let Some(agent) = slot.as_deref_mut() {
                agent.kernel_terminating();
            }
        }
        Ok(())
    }

    /// Run one lifecycle callback with the agent temporarily detached, so
    /// the kernel can serve as its capability without aliasing.
    fn dispatch_lifecycle<F>(&mut self, idx: usize, call: F) -> Result<(), KernelError>
    where
        F: FnOnce(&mut dyn Agent, &mut dyn KernelApi) -> Result<(), KernelError>,
    {
        let Some(mut agent) = self.agents[idx].take() else {
            return Ok(());
        };
        let outcome = call(agent.as_mut(), self);
        self.agents[idx] = Some(agent);
        outcome
    }

    fn mint_uniq_id(&mut self) -> u64 {
        let id = self.next_uniq_id;
        self.next_uniq_id += 1;
        id
    }

    fn event_line(&mut self, line: &str) {
        if !self.config.skip_log {
            self.logger.log(line);
        }
    }

    fn write_summary_log(&mut self) {
        let lines: Vec<String> = self
            .custom_state
            .iter()
            .map(|(key, value)| format!("SUMMARY|{key}|{value}"))
            .collect();
        for line in lines {
            self.event_line(&line);
        }
    }
}

impl KernelApi for Kernel {
    fn now(&self) -> Timestamp {
        self.current_time
    }

    fn send_message(
        &mut self,
        sender: AgentId,
        recipient: AgentId,
        message: Message,
        extra_delay: Nanos,
    ) {
        // The message leaves at the end of the sender's current computation
        // period: its standard delay, plus any delay accumulated this wake,
        // plus a one-off extra requested for this message alone.
        let base = if self.current_time.is_valid() {
            self.current_time
        } else {
            self.config.start_time
        };
        let sent_time = base
            + self
                .agent_computation_delays
                .get(sender.as_usize())
                .copied()
                .unwrap_or(self.config.default_computation_delay)
            + self.current_agent_additional_delay
            + extra_delay;

        let latency = self.latency.latency_ns(sender, recipient);
        let noise = self.rng.random_range(0..=DELIVERY_JITTER_NS);
        let deliver_at = sent_time + latency + noise;

        let uniq_id = self.mint_uniq_id();
        debug!(
            from = %sender,
            to = %recipient,
            kind = message.kind(),
            at = %deliver_at,
            uniq_id,
            "message enqueued"
        );
        self.messages.push(ScheduledMessage {
            deliver_at,
            uniq_id,
            sender,
            recipient,
            message,
        });
    }

    fn set_wakeup(&mut self, sender: AgentId, requested: Timestamp) -> Result<(), KernelError> {
        let requested = if requested == Timestamp::ZERO {
            let base = if self.current_time.is_valid() {
                self.current_time
            } else {
                self.config.start_time
            };
            base + DEFAULT_WAKEUP_OFFSET_NS
        } else {
            requested
        };

        if self.current_time.is_valid() && requested <= self.current_time {
            return Err(KernelError::ScheduleInPast {
                requested,
                current: self.current_time,
            });
        }

        let uniq_id = self.mint_uniq_id();
        self.messages.push(ScheduledMessage {
            deliver_at: requested,
            uniq_id,
            sender,
            recipient: sender,
            message: Message::Wakeup,
        });
        Ok(())
    }

    fn get_compute_delay(&self, agent: AgentId) -> Nanos {
        self.agent_computation_delays
            .get(agent.as_usize())
            .copied()
            .unwrap_or(self.config.default_computation_delay)
    }

    fn set_compute_delay(&mut self, agent: AgentId, delay: Nanos) -> Result<(), KernelError> {
        if delay < 0 {
            return Err(KernelError::NegativeComputationDelay(delay));
        }
        if let Some(slot) = self.agent_computation_delays.get_mut(agent.as_usize()) {
            *slot = delay;
        }
        Ok(())
    }

    fn delay(&mut self, additional: Nanos) {
        if additional < 0 {
            warn!(additional, "ignoring negative additional delay");
            return;
        }
        self.current_agent_additional_delay += additional;
    }

    fn find_agent_by_kind(&self, kind: &str) -> Option<AgentId> {
        self.agent_kinds
            .iter()
            .position(|k| k == kind)
            .map(|idx| AgentId(idx as u32))
    }

    fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn oracle(&self) -> Option<&dyn Oracle> {
        self.oracle.as_deref()
    }

    fn log_event(&mut self, agent: AgentId, event_type: &str, event: &str) {
        if self.config.skip_log {
            return;
        }
        let name = self
            .agent_names
            .get(agent.as_usize())
            .map(String::as_str)
            .unwrap_or("?");
        let line = format!("{}|{}|{}|{}", self.current_time, name, event_type, event);
        self.logger.log(&line);
    }

    fn record_agent_result(&mut self, kind: &str, gain: Cash) {
        let entry = self.result_by_kind.entry(kind.to_string()).or_insert((0, 0));
        entry.0 += gain.raw();
        entry.1 += 1;
    }
}
