//! Central configuration for a simulation session.
//!
//! All driver-level parameters live here for easy tuning; the kernel and
//! agent configs are derived from this one struct.

use std::path::PathBuf;
use types::{Cash, Nanos, Timestamp};

/// Master configuration for one simulated trading session.
#[derive(Debug, Clone)]
pub struct SimConfig {
    // ─────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────
    /// Symbol traded in the session.
    pub symbol: String,
    /// Market open, nanoseconds since the session epoch.
    pub mkt_open: Timestamp,
    /// Market close.
    pub mkt_close: Timestamp,
    /// Kernel stop time; normally a little past the close so end-of-session
    /// traffic drains.
    pub stop_time: Timestamp,
    /// Runs to execute back to back.
    pub num_simulations: usize,

    // ─────────────────────────────────────────────────────────────────────
    // Agents
    // ─────────────────────────────────────────────────────────────────────
    /// Number of noise agents.
    pub num_noise_agents: u32,
    /// Starting cash per noise agent.
    pub starting_cash: Cash,

    // ─────────────────────────────────────────────────────────────────────
    // Physics
    // ─────────────────────────────────────────────────────────────────────
    /// Seed for the kernel and all agent generators.
    pub seed: u64,
    /// Default per-agent computation delay.
    pub computation_delay: Nanos,
    /// Default pairwise latency.
    pub latency: Nanos,
    /// Exchange order-pipeline delay.
    pub pipeline_delay: Nanos,

    // ─────────────────────────────────────────────────────────────────────
    // Collaborators
    // ─────────────────────────────────────────────────────────────────────
    /// CSV file with `timestamp,value` fundamental rows.
    pub oracle_path: Option<PathBuf>,
    /// Event-log output file; stdout summary only when unset.
    pub log_path: Option<PathBuf>,
    /// Enable verbose diagnostics.
    pub verbose: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            symbol: "ABM".to_string(),
            mkt_open: Timestamp::ZERO,
            // One simulated minute.
            mkt_close: Timestamp(60_000_000_000),
            stop_time: Timestamp(61_000_000_000),
            num_simulations: 1,
            num_noise_agents: 100,
            starting_cash: Cash::from_float(100_000.0),
            seed: 1,
            computation_delay: 50,
            latency: 1_000,
            pipeline_delay: 40_000,
            oracle_path: None,
            log_path: None,
            verbose: false,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Builder-style setters
    // ─────────────────────────────────────────────────────────────────────

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn session_nanos(mut self, nanos: Nanos) -> Self {
        self.mkt_close = self.mkt_open + nanos;
        self.stop_time = self.mkt_close + nanos / 60;
        self
    }

    pub fn noise_agents(mut self, count: u32) -> Self {
        self.num_noise_agents = count;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn latency(mut self, latency: Nanos) -> Self {
        self.latency = latency;
        self
    }

    /// Total number of agents including the exchange.
    pub fn total_agents(&self) -> usize {
        self.num_noise_agents as usize + 1
    }

    // ─────────────────────────────────────────────────────────────────────
    // Presets
    // ─────────────────────────────────────────────────────────────────────

    /// Quick demo: a short session with a handful of agents.
    pub fn demo() -> Self {
        Self::default()
            .session_nanos(1_000_000_000)
            .noise_agents(10)
    }

    /// Stress test: a full hour with a large crowd.
    pub fn stress_test() -> Self {
        Self::default()
            .session_nanos(3_600_000_000_000)
            .noise_agents(5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_consistent() {
        let config = SimConfig::default();
        assert!(config.mkt_open < config.mkt_close);
        assert!(config.mkt_close < config.stop_time);
        assert_eq!(config.total_agents(), config.num_noise_agents as usize + 1);
    }

    #[test]
    fn test_session_nanos_moves_close_and_stop() {
        let config = SimConfig::new().session_nanos(1_000);
        assert_eq!(config.mkt_close, Timestamp(1_000));
        assert!(config.stop_time >= config.mkt_close);
    }

    #[test]
    fn test_presets_differ_from_default() {
        let default = SimConfig::default();
        assert_ne!(SimConfig::demo().num_noise_agents, default.num_noise_agents);
        assert_ne!(SimConfig::stress_test().mkt_close, default.mkt_close);
    }
}
