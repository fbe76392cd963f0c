//! Kernel configuration.

use types::{Nanos, Timestamp};

/// Parameters of one simulation run.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// First timestamp of the simulation; agents cannot act before it.
    pub start_time: Timestamp,
    /// The run stops once the clock passes this time.
    pub stop_time: Timestamp,
    /// Seed for the kernel generator (delivery jitter and any agent-visible
    /// randomness requested through the kernel).
    pub seed: u64,
    /// Computation delay assigned to every agent until it changes its own.
    pub default_computation_delay: Nanos,
    /// Pairwise latency used when no explicit model is installed.
    pub default_latency: Nanos,
    /// Number of back-to-back simulations to run.
    pub num_simulations: usize,
    /// Suppress event-log output.
    pub skip_log: bool,
}

impl KernelConfig {
    pub fn new(start_time: Timestamp, stop_time: Timestamp) -> Self {
        Self {
            start_time,
            stop_time,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_default_computation_delay(mut self, delay: Nanos) -> Self {
        self.default_computation_delay = delay;
        self
    }

    pub fn with_default_latency(mut self, latency: Nanos) -> Self {
        self.default_latency = latency;
        self
    }

    pub fn with_num_simulations(mut self, num_simulations: usize) -> Self {
        self.num_simulations = num_simulations;
        self
    }

    pub fn with_skip_log(mut self, skip_log: bool) -> Self {
        self.skip_log = skip_log;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            start_time: Timestamp::ZERO,
            stop_time: Timestamp(1_000_000_000),
            seed: 0,
            default_computation_delay: 1,
            default_latency: 1,
            num_simulations: 1,
            skip_log: false,
        }
    }
}
