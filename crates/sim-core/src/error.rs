//! Error types for order-book operations.

use std::fmt;
use types::{Price, Symbol};

/// Result type for order-book operations.
pub type Result<T> = std::result::Result<T, BookError>;

/// Order validation failures.
///
/// These are never fatal: the exchange logs the rejection and drops the
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    /// The order's symbol does not match this book.
    SymbolMismatch { expected: Symbol, got: Symbol },
    /// Order quantity must be a positive number of shares.
    ZeroQuantity,
    /// Limit price must be non-negative.
    NegativePrice(Price),
}

impl fmt::Display for BookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookError::SymbolMismatch { expected, got } => {
                write!(f, "order symbol {} does not match book symbol {}", got, expected)
            }
            BookError::ZeroQuantity => write!(f, "order quantity must be positive"),
            BookError::NegativePrice(p) => write!(f, "limit price {} must be non-negative", p),
        }
    }
}

impl std::error::Error for BookError {}
