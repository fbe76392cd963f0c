//! Fatal kernel errors.

use thiserror::Error;
use types::{Nanos, Timestamp};

/// Errors that abort the simulation run.
///
/// Everything else (order validation, unknown symbols, post-close requests)
/// is logged and contained to the offending agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// A wakeup was requested at or before the current simulation time.
    #[error("wakeup requested for {requested}, not in the future of {current}")]
    ScheduleInPast {
        requested: Timestamp,
        current: Timestamp,
    },

    /// Computation delays are a non-negative number of nanoseconds.
    #[error("computation delay must be non-negative, got {0}ns")]
    NegativeComputationDelay(Nanos),
}
