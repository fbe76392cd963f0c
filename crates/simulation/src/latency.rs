//! Inter-agent communication latency models.

use types::{AgentId, Nanos};

/// Pairwise message latency between agents.
pub trait LatencyModel {
    /// Nanoseconds a message from `from` to `to` spends in flight.
    fn latency_ns(&self, from: AgentId, to: AgentId) -> Nanos;
}

/// The same latency between every pair of agents.
#[derive(Debug, Clone)]
pub struct ConstantLatency {
    latency_ns: Nanos,
}

impl ConstantLatency {
    pub fn new(latency_ns: Nanos) -> Self {
        Self { latency_ns }
    }
}

impl LatencyModel for ConstantLatency {
    fn latency_ns(&self, _from: AgentId, _to: AgentId) -> Nanos {
        self.latency_ns
    }
}

/// A dense `[N][N]` latency matrix.
#[derive(Debug, Clone)]
pub struct MatrixLatency {
    matrix: Vec<Vec<Nanos>>,
    default: Nanos,
}

impl MatrixLatency {
    /// A uniform matrix for `n` agents.
    pub fn uniform(n: usize, default: Nanos) -> Self {
        Self {
            matrix: vec![vec![default; n]; n],
            default,
        }
    }

    /// Build from an explicit matrix; out-of-range pairs use `default`.
    pub fn from_matrix(matrix: Vec<Vec<Nanos>>, default: Nanos) -> Self {
        Self { matrix, default }
    }

    /// Override one directed pair.
    pub fn set(&mut self, from: AgentId, to: AgentId, latency_ns: Nanos) {
        if let Some(row) = self.matrix.get_mut(from.as_usize()) {
            if let Some(cell) = row.get_mut(to.as_usize()) {
                *cell = latency_ns;
            }
        }
    }
}

impl LatencyModel for MatrixLatency {
    fn latency_ns(&self, from: AgentId, to: AgentId) -> Nanos {
        self.matrix
            .get(from.as_usize())
            .and_then(|row| row.get(to.as_usize()))
            .copied()
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_latency() {
        let model = ConstantLatency::new(500);
        assert_eq!(model.latency_ns(AgentId(0), AgentId(1)), 500);
        assert_eq!(model.latency_ns(AgentId(3), AgentId(3)), 500);
    }

    #[test]
    fn test_matrix_latency() {
        let mut model = MatrixLatency::uniform(3, 100);
        model.set(AgentId(0), AgentId(2), 7_000);

        assert_eq!(model.latency_ns(AgentId(0), AgentId(2)), 7_000);
        assert_eq!(model.latency_ns(AgentId(2), AgentId(0)), 100);
        // Out-of-range agents fall back to the default.
        assert_eq!(model.latency_ns(AgentId(9), AgentId(0)), 100);
    }
}
