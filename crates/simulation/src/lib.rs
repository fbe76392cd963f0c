//! Simulation: the discrete-event kernel and its collaborators.
//!
//! This crate provides:
//! - The [`Kernel`]: a deterministic priority-queue scheduler with per-agent
//!   clocks, computation-delay and pairwise-latency semantics
//! - Latency models, the CSV-backed fundamental oracle, and event-log sinks
//! - [`KernelConfig`] describing one run

mod config;
mod kernel;
mod latency;
mod logger;
mod oracle;

pub use config::KernelConfig;
pub use kernel::{Kernel, DEFAULT_WAKEUP_OFFSET_NS};
pub use latency::{ConstantLatency, LatencyModel, MatrixLatency};
pub use logger::{EventLogger, FileLogger, MemoryLogger, NullLogger};
pub use oracle::{ExternalFileOracle, OracleError};
