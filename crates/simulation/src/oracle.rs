//! Fundamental-value oracle backed by an external price series.

use std::path::Path;
use thiserror::Error;
use tracing::warn;
use types::{Price, Symbol, Timestamp};

use agents::Oracle;

/// Errors building an oracle from an external file.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to read fundamental file: {0}")]
    Csv(#[from] csv::Error),

    #[error("fundamental file {0} contains no usable rows")]
    Empty(String),
}

/// Oracle reading `timestamp,value` rows from a CSV file.
///
/// Requests between two rows are linearly interpolated; requests outside the
/// series clamp to its endpoints. Values are cents.
pub struct ExternalFileOracle {
    symbol: Symbol,
    /// (timestamp, value-in-cents) points, sorted by timestamp.
    fundamental: Vec<(Timestamp, f64)>,
}

impl ExternalFileOracle {
    /// Load the fundamental series for one symbol from a CSV file.
    pub fn from_csv(symbol: impl Into<Symbol>, path: impl AsRef<Path>) -> Result<Self, OracleError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut fundamental = Vec::new();
        for record in reader.records() {
            let record = record?;
            let parsed = match (record.get(0), record.get(1)) {
                (Some(ts), Some(value)) => ts
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .zip(value.trim().parse::<f64>().ok()),
                _ => None,
            };
            match parsed {
                Some((ts, value)) => fundamental.push((Timestamp(ts), value)),
                // Tolerate header rows and junk lines.
                None => warn!(row = ?record, "skipping unparseable fundamental row"),
            }
        }

        if fundamental.is_empty() {
            return Err(OracleError::Empty(path.display().to_string()));
        }
        Ok(Self::from_points(symbol, fundamental))
    }

    /// Build directly from an in-memory series.
    pub fn from_points(symbol: impl Into<Symbol>, mut points: Vec<(Timestamp, f64)>) -> Self {
        points.sort_by_key(|(ts, _)| *ts);
        Self {
            symbol: symbol.into(),
            fundamental: points,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Oracle for ExternalFileOracle {
    fn fundamental_value(&self, symbol: &Symbol, at: Timestamp) -> Option<Price> {
        if *symbol != self.symbol || self.fundamental.is_empty() {
            return None;
        }

        let first = self.fundamental.first()?;
        let last = self.fundamental.last()?;
        if at <= first.0 {
            return Some(Price(first.1.round() as i64));
        }
        if at >= last.0 {
            return Some(Price(last.1.round() as i64));
        }

        // Index of the first point at or after `at`; the bracketing pair is
        // (upper - 1, upper).
        let upper = self.fundamental.partition_point(|(ts, _)| *ts < at);
        let (t0, v0) = self.fundamental[upper - 1];
        let (t1, v1) = self.fundamental[upper];

        let fraction = (at - t0) as f64 / (t1 - t0) as f64;
        let value = v0 + (v1 - v0) * fraction;
        Some(Price(value.round() as i64))
    }
}
