//! Example trading strategies.

mod noise_trader;

pub use noise_trader::{NoiseAgent, NoiseAgentConfig, NOISE_KIND};
