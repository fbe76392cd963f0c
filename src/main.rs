//! Market-sim driver.
//!
//! Builds the logger, oracle, exchange, and noise-agent population from the
//! CLI options, runs the kernel, and prints the run summary.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use agents::{ExchangeAgent, ExchangeAgentConfig, NoiseAgent, NoiseAgentConfig};
use simulation::{
    EventLogger, ExternalFileOracle, FileLogger, Kernel, KernelConfig, MatrixLatency, NullLogger,
};
use types::AgentId;

pub use config::SimConfig;

/// Discrete-event limit-order market simulator.
#[derive(Parser)]
#[clap(name = "market-sim")]
struct Cli {
    /// Symbol traded in the session.
    #[clap(long, default_value = "ABM")]
    symbol: String,

    /// Number of noise agents.
    #[clap(long, default_value_t = 100)]
    noise_agents: u32,

    /// Seed for the kernel and all agent generators.
    #[clap(long, default_value_t = 1)]
    seed: u64,

    /// Session length in simulated milliseconds.
    #[clap(long, default_value_t = 60_000)]
    session_ms: u64,

    /// CSV file with `timestamp,value` fundamental rows.
    #[clap(long)]
    oracle: Option<PathBuf>,

    /// Event-log output file.
    #[clap(long)]
    log: Option<PathBuf>,

    /// Enable verbose diagnostics.
    #[clap(long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> SimConfig {
        let mut config = SimConfig::new()
            .symbol(self.symbol)
            .session_nanos(self.session_ms as i64 * 1_000_000)
            .noise_agents(self.noise_agents)
            .seed(self.seed);
        config.oracle_path = self.oracle;
        config.log_path = self.log;
        config.verbose = self.verbose;
        config
    }
}

fn build_kernel(config: &SimConfig) -> Result<Kernel> {
    let kernel_config = KernelConfig::new(config.mkt_open, config.stop_time)
        .with_seed(config.seed)
        .with_default_computation_delay(config.computation_delay)
        .with_default_latency(config.latency)
        .with_num_simulations(config.num_simulations);

    let latency = MatrixLatency::uniform(config.total_agents(), config.latency);
    let logger: Box<dyn EventLogger> = match &config.log_path {
        Some(path) => Box::new(
            FileLogger::create(path)
                .with_context(|| format!("creating event log {}", path.display()))?,
        ),
        None => Box::new(NullLogger),
    };

    let mut kernel = Kernel::new("market-sim", kernel_config)
        .with_latency_model(Box::new(latency))
        .with_logger(logger);

    if let Some(path) = &config.oracle_path {
        let oracle = ExternalFileOracle::from_csv(config.symbol.clone(), path)
            .with_context(|| format!("loading fundamental file {}", path.display()))?;
        kernel = kernel.with_oracle(Box::new(oracle));
    }

    // The exchange is always agent 0, so trading agents can find it.
    kernel.add_agent(Box::new(ExchangeAgent::new(
        AgentId(0),
        ExchangeAgentConfig::new(
            vec![config.symbol.clone()],
            config.mkt_open,
            config.mkt_close,
        )
        .with_pipeline_delay(config.pipeline_delay),
    )));

    // Noise agents wake at seeded random times across the session.
    let mut wakeup_rng = StdRng::seed_from_u64(config.seed);
    let session = config.mkt_close - config.mkt_open;
    for i in 0..config.num_noise_agents {
        let id = AgentId(i + 1);
        let offset = wakeup_rng.random_range(0..session.max(1));
        let noise_config = NoiseAgentConfig {
            symbol: config.symbol.clone(),
            wakeup_time: config.mkt_open + offset,
            starting_cash: config.starting_cash,
            ..NoiseAgentConfig::default()
        };
        kernel.add_agent(Box::new(NoiseAgent::new(id, noise_config, config.seed)));
    }

    Ok(kernel)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config();

    let filter = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    info!(
        symbol = %config.symbol,
        agents = config.total_agents(),
        open = %config.mkt_open,
        close = %config.mkt_close,
        seed = config.seed,
        "starting session"
    );

    let mut kernel = build_kernel(&config)?;
    let custom_state = kernel.run().context("simulation run failed")?;

    println!("--- run summary ---");
    for (key, value) in &custom_state {
        println!("{key}: {value}");
    }
    Ok(())
}
