//! In-memory kernel capability for agent unit tests.

use rand::rngs::StdRng;
use rand::SeedableRng;
use types::{AgentId, Cash, Message, Nanos, OrderId, Timestamp};

use crate::error::KernelError;
use crate::traits::{KernelApi, Oracle};

/// Records every capability call instead of scheduling anything.
pub struct MockKernel {
    pub now: Timestamp,
    pub sent: Vec<(AgentId, AgentId, Message, Nanos)>,
    pub wakeups: Vec<(AgentId, Timestamp)>,
    pub events: Vec<(AgentId, String, String)>,
    pub results: Vec<(String, Cash)>,
    pub agents_by_kind: Vec<(String, AgentId)>,
    next_order_id: u64,
    rng: StdRng,
}

impl MockKernel {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            sent: Vec::new(),
            wakeups: Vec::new(),
            events: Vec::new(),
            results: Vec::new(),
            agents_by_kind: Vec::new(),
            next_order_id: 1,
            rng: StdRng::seed_from_u64(42),
        }
    }

    pub fn with_agent(mut self, kind: &str, id: AgentId) -> Self {
        self.agents_by_kind.push((kind.to_string(), id));
        self
    }

    /// Messages sent to one recipient, in order.
    pub fn sent_to(&self, recipient: AgentId) -> Vec<&Message> {
        self.sent
            .iter()
            .filter(|(_, to, _, _)| *to == recipient)
            .map(|(_, _, msg, _)| msg)
            .collect()
    }
}

impl KernelApi for MockKernel {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn send_message(
        &mut self,
        sender: AgentId,
        recipient: AgentId,
        message: Message,
        extra_delay: Nanos,
    ) {
        self.sent.push((sender, recipient, message, extra_delay));
    }

    fn set_wakeup(&mut self, sender: AgentId, requested: Timestamp) -> Result<(), KernelError> {
        if self.now.is_valid() && requested <= self.now {
            return Err(KernelError::ScheduleInPast {
                requested,
                current: self.now,
            });
        }
        self.wakeups.push((sender, requested));
        Ok(())
    }

    fn get_compute_delay(&self, _agent: AgentId) -> Nanos {
        0
    }

    fn set_compute_delay(&mut self, _agent: AgentId, delay: Nanos) -> Result<(), KernelError> {
        if delay < 0 {
            return Err(KernelError::NegativeComputationDelay(delay));
        }
        Ok(())
    }

    fn delay(&mut self, _additional: Nanos) {}

    fn find_agent_by_kind(&self, kind: &str) -> Option<AgentId> {
        self.agents_by_kind
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, id)| *id)
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
        None
    }

    fn log_event(&mut self, agent: AgentId, event_type: &str, event: &str) {
        self.events
            .push((agent, event_type.to_string(), event.to_string()));
    }

    fn record_agent_result(&mut self, kind: &str, gain: Cash) {
        self.results.push((kind.to_string(), gain));
    }
}
